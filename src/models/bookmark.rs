use crate::error::{AppError, Result};

/// A bookmark as submitted by the user, already trimmed and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookmark {
    pub url: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl NewBookmark {
    pub fn from_input(url: &str, title: &str, description: &str, tags_csv: &str) -> Result<Self> {
        let title = title.trim();
        let url = url.trim();

        if title.is_empty() {
            return Err(AppError::Validation(
                "Title is required and cannot be empty".to_string(),
            ));
        }
        if url.is_empty() {
            return Err(AppError::Validation(
                "URL is required and cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            url: url.to_string(),
            title: title.to_string(),
            description: description.trim().to_string(),
            tags: parse_tags(tags_csv),
        })
    }
}

/// Split a comma separated tag list, dropping blank entries.
pub fn parse_tags(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
