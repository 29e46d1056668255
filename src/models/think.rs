use crate::error::{AppError, Result};

/// Marker stored in `thinks.tags` by this client.
pub const EMPTY_TAGS: &str = "EMPTY";

const SELECTION_TITLE_CHARS: usize = 50;

/// A think ready to insert. Only constructible with non-empty title and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewThink {
    title: String,
    content: String,
}

impl NewThink {
    pub fn new(title: &str, content: &str) -> Result<Self> {
        let title = title.trim();
        let content = content.trim();

        if content.is_empty() {
            return Err(AppError::Validation(
                "Please enter content for your think.".to_string(),
            ));
        }
        if title.is_empty() {
            return Err(AppError::Validation(
                "Please enter a title for your think.".to_string(),
            ));
        }

        Ok(Self {
            title: title.to_string(),
            content: content.to_string(),
        })
    }

    /// A think built from selected page text; the title comes from its first line.
    pub fn from_selection(selection: &str) -> Result<Self> {
        if selection.trim().is_empty() {
            return Err(AppError::Validation("The selection is empty.".to_string()));
        }
        Ok(Self {
            title: title_from_selection(selection),
            content: selection.to_string(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// First line, trimmed, cut to 50 characters with `...` appended when longer.
pub fn title_from_selection(selection: &str) -> String {
    let first_line = selection.split('\n').next().unwrap_or_default().trim();
    if first_line.is_empty() {
        return "Untitled".to_string();
    }
    if first_line.chars().count() > SELECTION_TITLE_CHARS {
        let cut: String = first_line.chars().take(SELECTION_TITLE_CHARS).collect();
        format!("{}...", cut)
    } else {
        first_line.to_string()
    }
}
