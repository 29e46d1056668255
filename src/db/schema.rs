/// Tables a ThinkNote database must carry before this client will touch it.
pub const REQUIRED_TABLES: [&str; 5] = [
    "bookmarks",
    "bookmarks_tags",
    "bookmarks_tag_url_patterns",
    "thinks",
    "sync_info",
];

/// Layout written by the ThinkNote desktop app. Identifiers are plain
/// integers chosen by the writer, never AUTOINCREMENT.
#[cfg(test)]
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS bookmarks (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    description TEXT,
    timestamp TEXT NOT NULL,
    hidden INTEGER NOT NULL DEFAULT 0,
    tag_ids TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS bookmarks_tags (
    id INTEGER PRIMARY KEY,
    tag TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS bookmarks_tag_url_patterns (
    url_pattern TEXT NOT NULL,
    tag TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS thinks (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    deleted_at INTEGER,
    is_favorite INTEGER NOT NULL DEFAULT 0,
    tags TEXT NOT NULL DEFAULT 'EMPTY',
    order_index INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS sync_info (
    id INTEGER PRIMARY KEY,
    last_modified INTEGER NOT NULL
);

INSERT INTO sync_info (id, last_modified) VALUES (1, 1000);
"#;

/// A fresh database image with the full layout, plus whatever `extra_sql` adds.
#[cfg(test)]
pub fn fixture_bytes_with(extra_sql: &str) -> Vec<u8> {
    let file = tempfile::NamedTempFile::new().unwrap();
    {
        let conn = rusqlite::Connection::open(file.path()).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute_batch(extra_sql).unwrap();
    }
    std::fs::read(file.path()).unwrap()
}

#[cfg(test)]
pub fn fixture_bytes() -> Vec<u8> {
    fixture_bytes_with("")
}
