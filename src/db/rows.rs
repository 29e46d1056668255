use super::session::{FromRow, Row};
use crate::error::Result;

/// `SELECT MAX(id) AS max_id ...`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxIdRow {
    pub max_id: Option<i64>,
}

impl FromRow for MaxIdRow {
    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            max_id: row.get_opt_i64("max_id")?,
        })
    }
}

/// The part of a bookmark needed to decide between insert and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingBookmark {
    pub id: i64,
    pub title: String,
}

impl FromRow for ExistingBookmark {
    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            id: row.get_i64("id")?,
            title: row.get_string("title")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagIdRow {
    pub id: i64,
}

impl FromRow for TagIdRow {
    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            id: row.get_i64("id")?,
        })
    }
}

/// Rule: URLs containing `url_pattern` get `tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPatternRow {
    pub url_pattern: String,
    pub tag: String,
}

impl FromRow for UrlPatternRow {
    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            url_pattern: row.get_string("url_pattern")?,
            tag: row.get_string("tag")?,
        })
    }
}
