//! Insert-or-update rules for records written into a downloaded database.
//!
//! Identifiers are chosen here as `MAX(id) + 1`, since the shared file is
//! written by several apps and none of them rely on AUTOINCREMENT.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;

use super::rows::{ExistingBookmark, MaxIdRow, TagIdRow, UrlPatternRow};
use super::session::Session;
use crate::error::{AppError, Result};
use crate::models::{NewBookmark, NewThink, SaveOutcome, EMPTY_TAGS};
use crate::sync::Confirm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdTable {
    Bookmarks,
    BookmarkTags,
    Thinks,
}

impl IdTable {
    fn name(self) -> &'static str {
        match self {
            IdTable::Bookmarks => "bookmarks",
            IdTable::BookmarkTags => "bookmarks_tags",
            IdTable::Thinks => "thinks",
        }
    }
}

pub async fn next_id(session: &Session, table: IdTable) -> Result<i64> {
    let sql = format!("SELECT MAX(id) AS max_id FROM {}", table.name());
    let rows: Vec<MaxIdRow> = session.execute(&sql, Vec::new()).await?.decode()?;
    let max_id = rows.first().and_then(|row| row.max_id).unwrap_or(0);
    Ok(max_id + 1)
}

/// Drop repeated names, keeping the first occurrence of each.
pub fn dedup_preserving_order(names: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !seen.contains(name) {
            seen.push(name.clone());
        }
    }
    seen
}

async fn find_tag_id(session: &Session, tag: &str) -> Result<Option<i64>> {
    let rows: Vec<TagIdRow> = session
        .execute(
            "SELECT id FROM bookmarks_tags WHERE tag = ?",
            vec![Value::Text(tag.to_string())],
        )
        .await?
        .decode()?;
    Ok(rows.first().map(|row| row.id))
}

/// Map tag names to ids, creating missing tags. Output order follows the
/// first occurrence of each name.
pub async fn resolve_tags(session: &Session, names: &[String]) -> Result<Vec<i64>> {
    let mut ids = Vec::new();

    for name in dedup_preserving_order(names) {
        if let Some(id) = find_tag_id(session, &name).await? {
            tracing::debug!("Found existing tag '{}' with ID: {}", name, id);
            ids.push(id);
            continue;
        }

        let new_id = next_id(session, IdTable::BookmarkTags).await?;
        session
            .execute(
                "INSERT INTO bookmarks_tags (id, tag) VALUES (?, ?)",
                vec![Value::Integer(new_id), Value::Text(name.clone())],
            )
            .await?;
        let id = find_tag_id(session, &name).await?.ok_or_else(|| {
            AppError::Database(format!("tag '{}' missing right after insert", name))
        })?;
        tracing::debug!("Created new tag '{}' with ID: {}", name, id);
        ids.push(id);
    }

    Ok(ids)
}

/// Tags of every URL pattern rule whose pattern occurs in `url`, in table order.
pub async fn match_auto_tags(session: &Session, url: &str) -> Result<Vec<String>> {
    let patterns: Vec<UrlPatternRow> = session
        .execute(
            "SELECT url_pattern, tag FROM bookmarks_tag_url_patterns",
            Vec::new(),
        )
        .await?
        .decode()?;

    let tags = patterns
        .into_iter()
        .filter(|rule| url.contains(rule.url_pattern.as_str()))
        .map(|rule| {
            tracing::debug!(
                "URL matches pattern '{}', adding tag '{}'",
                rule.url_pattern,
                rule.tag
            );
            rule.tag
        })
        .collect();
    Ok(tags)
}

pub async fn find_bookmark_by_url(session: &Session, url: &str) -> Result<Option<ExistingBookmark>> {
    let rows: Vec<ExistingBookmark> = session
        .execute(
            "SELECT id, title FROM bookmarks WHERE url = ?",
            vec![Value::Text(url.to_string())],
        )
        .await?
        .decode()?;
    Ok(rows.into_iter().next())
}

/// Bump the shared modification time. Returns false when the image has no
/// `sync_info` row to bump; the save still goes through.
pub async fn touch_sync_info(session: &Session, now: DateTime<Utc>) -> Result<bool> {
    session
        .execute(
            "UPDATE sync_info SET last_modified = ? WHERE id = 1",
            vec![Value::Integer(now.timestamp_millis())],
        )
        .await?;
    let changed = session
        .execute("SELECT changes() AS changed", Vec::new())
        .await?
        .first()
        .map(|row| row.get_i64("changed"))
        .transpose()?
        .unwrap_or(0);

    if changed == 0 {
        tracing::warn!("sync_info has no row with id 1, modification time not updated");
        return Ok(false);
    }
    Ok(true)
}

/// Insert a bookmark, or overwrite the one already saved under the same URL
/// once `confirm` agrees. A refusal returns `UserCancelled` before any write.
pub async fn upsert_bookmark(
    session: &Session,
    bookmark: &NewBookmark,
    confirm: &dyn Confirm,
    now: DateTime<Utc>,
) -> Result<SaveOutcome> {
    let existing = find_bookmark_by_url(session, &bookmark.url).await?;

    if let Some(existing) = &existing {
        let message = format!(
            "A bookmark with this URL already exists:\n\n{}\n\nDo you want to overwrite it with the new data?",
            existing.title
        );
        if !confirm.confirm("Bookmark Already Exists", &message).await {
            tracing::warn!("Kept existing bookmark #{}", existing.id);
            return Err(AppError::UserCancelled(format!(
                "kept existing bookmark \"{}\"",
                existing.title
            )));
        }
    }

    let mut tags = bookmark.tags.clone();
    tags.extend(match_auto_tags(session, &bookmark.url).await?);
    let tag_ids = resolve_tags(session, &tags).await?;
    let tag_ids_json = serde_json::to_string(&tag_ids)
        .map_err(|e| AppError::Database(format!("invalid tag id list: {}", e)))?;
    let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);

    let outcome = match existing {
        Some(existing) => {
            session
                .execute(
                    "UPDATE bookmarks SET title = ?, description = ?, timestamp = ?, tag_ids = ? WHERE id = ?",
                    vec![
                        Value::Text(bookmark.title.clone()),
                        Value::Text(bookmark.description.clone()),
                        Value::Text(timestamp),
                        Value::Text(tag_ids_json),
                        Value::Integer(existing.id),
                    ],
                )
                .await?;
            SaveOutcome::BookmarkUpdated { id: existing.id }
        }
        None => {
            let id = next_id(session, IdTable::Bookmarks).await?;
            session
                .execute(
                    "INSERT INTO bookmarks (id, title, url, description, timestamp, hidden, tag_ids) VALUES (?, ?, ?, ?, ?, ?, ?)",
                    vec![
                        Value::Integer(id),
                        Value::Text(bookmark.title.clone()),
                        Value::Text(bookmark.url.clone()),
                        Value::Text(bookmark.description.clone()),
                        Value::Text(timestamp),
                        Value::Integer(0),
                        Value::Text(tag_ids_json),
                    ],
                )
                .await?;
            SaveOutcome::BookmarkInserted { id }
        }
    };

    touch_sync_info(session, now).await?;
    Ok(outcome)
}

pub async fn insert_think(session: &Session, think: &NewThink, now: DateTime<Utc>) -> Result<SaveOutcome> {
    let id = next_id(session, IdTable::Thinks).await?;
    let millis = now.timestamp_millis();

    session
        .execute(
            "INSERT INTO thinks (id, title, content, created_at, updated_at, deleted_at, is_favorite, tags, order_index) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            vec![
                Value::Integer(id),
                Value::Text(think.title().to_string()),
                Value::Text(think.content().to_string()),
                Value::Integer(millis),
                Value::Integer(millis),
                Value::Null,
                Value::Integer(0),
                Value::Text(EMPTY_TAGS.to_string()),
                Value::Integer(0),
            ],
        )
        .await?;

    touch_sync_info(session, now).await?;
    Ok(SaveOutcome::ThinkInserted { id })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::db::schema::{fixture_bytes, fixture_bytes_with};

    struct CountingConfirm {
        answer: bool,
        asked: AtomicUsize,
    }

    impl CountingConfirm {
        fn new(answer: bool) -> Self {
            Self {
                answer,
                asked: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Confirm for CountingConfirm {
        async fn confirm(&self, _title: &str, message: &str) -> bool {
            assert!(message.contains("Old title"));
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    async fn scalar(session: &Session, sql: &str) -> i64 {
        session
            .execute(sql, Vec::new())
            .await
            .unwrap()
            .first()
            .unwrap()
            .get_i64("v")
            .unwrap()
    }

    fn names(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    const EXISTING: &str = "INSERT INTO bookmarks (id, title, url, description, timestamp, hidden, tag_ids) \
         VALUES (3, 'Old title', 'https://example.com/a', '', '2020-01-01T00:00:00.000Z', 0, '[]');";

    #[tokio::test]
    async fn test_touch_sync_info_reports_missing_row() {
        let session = Session::open(&fixture_bytes()).await.unwrap();
        assert!(touch_sync_info(&session, at(5_000)).await.unwrap());
        assert_eq!(
            scalar(&session, "SELECT last_modified AS v FROM sync_info WHERE id = 1").await,
            5_000
        );

        let session = Session::open(&fixture_bytes_with("DELETE FROM sync_info;"))
            .await
            .unwrap();
        assert!(!touch_sync_info(&session, at(5_000)).await.unwrap());

        let outcome = insert_think(&session, &NewThink::new("T", "C").unwrap(), at(5_000))
            .await
            .unwrap();
        assert_eq!(outcome, SaveOutcome::ThinkInserted { id: 1 });
    }

    #[tokio::test]
    async fn test_next_id_on_empty_table_is_one() {
        let session = Session::open(&fixture_bytes()).await.unwrap();
        assert_eq!(next_id(&session, IdTable::Thinks).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_next_id_follows_max() {
        let session = Session::open(&fixture_bytes_with(
            "INSERT INTO thinks (id, title, content, created_at, updated_at) VALUES (2, 't', 'c', 0, 0);
             INSERT INTO thinks (id, title, content, created_at, updated_at) VALUES (7, 't', 'c', 0, 0);",
        ))
        .await
        .unwrap();
        assert_eq!(next_id(&session, IdTable::Thinks).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_resolve_tags_dedups_in_first_seen_order() {
        let session = Session::open(&fixture_bytes()).await.unwrap();
        let ids = resolve_tags(&session, &names(&["b", "a", "b"])).await.unwrap();
        assert_eq!(ids.len(), 2);

        assert_eq!(find_tag_id(&session, "b").await.unwrap(), Some(ids[0]));
        assert_eq!(find_tag_id(&session, "a").await.unwrap(), Some(ids[1]));
        assert_eq!(scalar(&session, "SELECT COUNT(*) AS v FROM bookmarks_tags").await, 2);
    }

    #[tokio::test]
    async fn test_resolve_tags_reuses_existing_rows() {
        let session = Session::open(&fixture_bytes_with(
            "INSERT INTO bookmarks_tags (id, tag) VALUES (5, 'rust');",
        ))
        .await
        .unwrap();
        let ids = resolve_tags(&session, &names(&["rust", "Rust"])).await.unwrap();
        assert_eq!(ids, vec![5, 6]);
    }

    #[tokio::test]
    async fn test_auto_tags_include_every_match() {
        let session = Session::open(&fixture_bytes_with(
            "INSERT INTO bookmarks_tag_url_patterns (url_pattern, tag) VALUES ('github.com', 'dev');
             INSERT INTO bookmarks_tag_url_patterns (url_pattern, tag) VALUES ('docs', 'reference');
             INSERT INTO bookmarks_tag_url_patterns (url_pattern, tag) VALUES ('gitlab.com', 'dev');",
        ))
        .await
        .unwrap();
        let tags = match_auto_tags(&session, "https://github.com/x/docs")
            .await
            .unwrap();
        assert_eq!(tags, names(&["dev", "reference"]));
    }

    #[tokio::test]
    async fn test_insert_bookmark_with_manual_and_auto_tags() {
        let session = Session::open(&fixture_bytes_with(
            "INSERT INTO bookmarks_tag_url_patterns (url_pattern, tag) VALUES ('example.com', 'web');",
        ))
        .await
        .unwrap();
        let bookmark =
            NewBookmark::from_input("https://example.com/new", "New", "desc", "web, rust").unwrap();
        let confirm = CountingConfirm::new(true);

        let outcome = upsert_bookmark(&session, &bookmark, &confirm, at(1_700_000_000_123))
            .await
            .unwrap();
        assert_eq!(outcome, SaveOutcome::BookmarkInserted { id: 1 });
        assert_eq!(confirm.asked.load(Ordering::SeqCst), 0);

        let rows = session
            .execute("SELECT * FROM bookmarks WHERE id = 1", Vec::new())
            .await
            .unwrap();
        let row = rows.first().unwrap();
        assert_eq!(row.get_string("tag_ids").unwrap(), "[1,2]");
        assert_eq!(row.get_i64("hidden").unwrap(), 0);
        assert_eq!(
            row.get_string("timestamp").unwrap(),
            "2023-11-14T22:13:20.123Z"
        );
        assert_eq!(
            scalar(&session, "SELECT last_modified AS v FROM sync_info WHERE id = 1").await,
            1_700_000_000_123
        );
    }

    #[tokio::test]
    async fn test_declined_overwrite_changes_nothing() {
        let session = Session::open(&fixture_bytes_with(EXISTING)).await.unwrap();
        let bookmark =
            NewBookmark::from_input("https://example.com/a", "New title", "", "fresh").unwrap();
        let confirm = CountingConfirm::new(false);

        let err = upsert_bookmark(&session, &bookmark, &confirm, at(5_000))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UserCancelled(_)));
        assert_eq!(confirm.asked.load(Ordering::SeqCst), 1);

        assert_eq!(
            scalar(&session, "SELECT last_modified AS v FROM sync_info WHERE id = 1").await,
            1000
        );
        assert_eq!(scalar(&session, "SELECT COUNT(*) AS v FROM bookmarks_tags").await, 0);
        let rows = session
            .execute("SELECT title FROM bookmarks WHERE id = 3", Vec::new())
            .await
            .unwrap();
        assert_eq!(rows.first().unwrap().get_string("title").unwrap(), "Old title");
    }

    #[tokio::test]
    async fn test_confirmed_overwrite_updates_in_place() {
        let session = Session::open(&fixture_bytes_with(EXISTING)).await.unwrap();
        let bookmark =
            NewBookmark::from_input("https://example.com/a", "New title", "d", "").unwrap();
        let confirm = CountingConfirm::new(true);

        let outcome = upsert_bookmark(&session, &bookmark, &confirm, at(9_000))
            .await
            .unwrap();
        assert_eq!(outcome, SaveOutcome::BookmarkUpdated { id: 3 });
        assert_eq!(scalar(&session, "SELECT COUNT(*) AS v FROM bookmarks").await, 1);
        assert_eq!(
            scalar(&session, "SELECT last_modified AS v FROM sync_info WHERE id = 1").await,
            9_000
        );

        let rows = session
            .execute("SELECT title, description, tag_ids FROM bookmarks WHERE id = 3", Vec::new())
            .await
            .unwrap();
        let row = rows.first().unwrap();
        assert_eq!(row.get_string("title").unwrap(), "New title");
        assert_eq!(row.get_string("description").unwrap(), "d");
        assert_eq!(row.get_string("tag_ids").unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_insert_think_sets_fixed_fields() {
        let session = Session::open(&fixture_bytes()).await.unwrap();
        let think = NewThink::new("Idea", "Write it down").unwrap();

        let outcome = insert_think(&session, &think, at(77_000)).await.unwrap();
        assert_eq!(outcome, SaveOutcome::ThinkInserted { id: 1 });

        let rows = session
            .execute("SELECT * FROM thinks WHERE id = 1", Vec::new())
            .await
            .unwrap();
        let row = rows.first().unwrap();
        assert_eq!(row.get_string("title").unwrap(), "Idea");
        assert_eq!(row.get_i64("created_at").unwrap(), 77_000);
        assert_eq!(row.get_i64("updated_at").unwrap(), 77_000);
        assert_eq!(row.get_opt_i64("deleted_at").unwrap(), None);
        assert_eq!(row.get_i64("is_favorite").unwrap(), 0);
        assert_eq!(row.get_string("tags").unwrap(), "EMPTY");
        assert_eq!(row.get_i64("order_index").unwrap(), 0);
    }
}
