mod bookmark;
mod think;

use serde::Serialize;

pub use bookmark::NewBookmark;
pub use think::{NewThink, EMPTY_TAGS};

/// What a successful sync cycle changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SaveOutcome {
    BookmarkInserted { id: i64 },
    BookmarkUpdated { id: i64 },
    ThinkInserted { id: i64 },
}

impl SaveOutcome {
    pub fn id(&self) -> i64 {
        match *self {
            SaveOutcome::BookmarkInserted { id }
            | SaveOutcome::BookmarkUpdated { id }
            | SaveOutcome::ThinkInserted { id } => id,
        }
    }
}

impl std::fmt::Display for SaveOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveOutcome::BookmarkInserted { id } => write!(f, "Bookmark #{} saved", id),
            SaveOutcome::BookmarkUpdated { id } => write!(f, "Bookmark #{} updated", id),
            SaveOutcome::ThinkInserted { id } => write!(f, "Think #{} saved", id),
        }
    }
}
