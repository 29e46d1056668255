use std::io::Write;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, DatabaseName};
use tempfile::NamedTempFile;
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};

/// Rows returned by a statement, addressable by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<Row<'_>> {
        self.iter().next()
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    /// Decode every row into a typed record.
    pub fn decode<T: FromRow>(&self) -> Result<Vec<T>> {
        self.iter().map(|row| T::from_row(&row)).collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    fn require(&self, column: &str) -> Result<&'a Value> {
        self.get(column)
            .ok_or_else(|| AppError::Database(format!("no column named {}", column)))
    }

    pub fn get_opt_i64(&self, column: &str) -> Result<Option<i64>> {
        match self.require(column)? {
            Value::Null => Ok(None),
            Value::Integer(v) => Ok(Some(*v)),
            Value::Real(v) => Ok(Some(*v as i64)),
            Value::Text(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| AppError::Database(format!("{} is not an integer: {}", column, s))),
            Value::Blob(_) => Err(AppError::Database(format!("{} is a blob", column))),
        }
    }

    pub fn get_i64(&self, column: &str) -> Result<i64> {
        self.get_opt_i64(column)?
            .ok_or_else(|| AppError::Database(format!("{} is NULL", column)))
    }

    pub fn get_string(&self, column: &str) -> Result<String> {
        match self.require(column)? {
            Value::Text(s) => Ok(s.clone()),
            Value::Integer(v) => Ok(v.to_string()),
            Value::Real(v) => Ok(v.to_string()),
            Value::Null => Ok(String::new()),
            Value::Blob(b) => Ok(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

/// Typed view of a single result row.
pub trait FromRow: Sized {
    fn from_row(row: &Row<'_>) -> Result<Self>;
}

/// A downloaded database opened for one sync cycle.
///
/// The image lives in a scratch file that is removed when the session is
/// dropped; nothing is written back anywhere except through [`Session::export`].
pub struct Session {
    conn: Connection,
    _image: NamedTempFile,
}

impl Session {
    pub async fn open(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(AppError::CorruptDatabase("file is empty".to_string()));
        }

        let mut image = NamedTempFile::new()?;
        image.write_all(bytes)?;
        image.flush()?;

        let conn = Connection::open(image.path())
            .await
            .map_err(|e| AppError::CorruptDatabase(e.to_string()))?;

        // SQLite only notices a bad header on first read.
        let check = conn
            .call(|conn| {
                let check: String = conn.query_row("PRAGMA quick_check", [], |row| row.get(0))?;
                Ok(check)
            })
            .await
            .map_err(|e| AppError::CorruptDatabase(e.to_string()))?;
        if check != "ok" {
            return Err(AppError::CorruptDatabase(check));
        }

        tracing::debug!("Opened database image of {} bytes", bytes.len());
        Ok(Self {
            conn,
            _image: image,
        })
    }

    /// Run one parameterized statement. Mutating statements return an empty set.
    pub async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<RowSet> {
        tracing::debug!("Executing SQL: {} ({} params)", sql, params.len());
        let sql = sql.to_string();

        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let columns: Vec<String> =
                    stmt.column_names().into_iter().map(String::from).collect();
                let width = columns.len();

                let mut rows = Vec::new();
                let mut query = stmt.query(params_from_iter(params.iter()))?;
                while let Some(row) = query.next()? {
                    let mut values = Vec::with_capacity(width);
                    for i in 0..width {
                        values.push(row.get::<_, Value>(i)?);
                    }
                    rows.push(values);
                }
                Ok(RowSet { columns, rows })
            })
            .await?;

        Ok(rows)
    }

    /// Names of the tables this image lacks, out of `required`.
    pub async fn missing_tables(&self, required: &[&str]) -> Result<Vec<String>> {
        let present: Vec<String> = self
            .execute(
                "SELECT name FROM sqlite_master WHERE type = 'table'",
                Vec::new(),
            )
            .await?
            .iter()
            .map(|row| row.get_string("name"))
            .collect::<Result<_>>()?;

        Ok(required
            .iter()
            .filter(|table| !present.iter().any(|p| p == *table))
            .map(|table| table.to_string())
            .collect())
    }

    /// Serialize the current state, including every statement run so far.
    pub async fn export(&self) -> Result<Vec<u8>> {
        let out = NamedTempFile::new()?;
        let out_path = out.path().to_path_buf();

        self.conn
            .call(move |conn| {
                conn.backup(DatabaseName::Main, &out_path, None)?;
                Ok(())
            })
            .await?;

        let bytes = tokio::fs::read(out.path()).await?;
        tracing::debug!("Exported database image of {} bytes", bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::fixture_bytes;

    #[tokio::test]
    async fn test_open_rejects_garbage() {
        let err = Session::open(b"definitely not a database, just some bytes")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::CorruptDatabase(_)));

        let err = Session::open(&[]).await.err().unwrap();
        assert!(matches!(err, AppError::CorruptDatabase(_)));
    }

    #[tokio::test]
    async fn test_execute_returns_rows_by_column_name() {
        let session = Session::open(&fixture_bytes()).await.unwrap();
        session
            .execute(
                "INSERT INTO bookmarks_tags (id, tag) VALUES (?, ?)",
                vec![Value::Integer(4), Value::Text("rust".into())],
            )
            .await
            .unwrap();

        let rows = session
            .execute(
                "SELECT id, tag FROM bookmarks_tags WHERE tag = ?",
                vec![Value::Text("rust".into())],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        let row = rows.first().unwrap();
        assert_eq!(row.get_i64("id").unwrap(), 4);
        assert_eq!(row.get_string("tag").unwrap(), "rust");
        assert!(row.get("missing").is_none());
    }

    #[tokio::test]
    async fn test_sql_errors_are_database_errors() {
        let session = Session::open(&fixture_bytes()).await.unwrap();
        let err = session
            .execute("SELECT * FROM no_such_table", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn test_export_reflects_mutations() {
        let session = Session::open(&fixture_bytes()).await.unwrap();
        session
            .execute(
                "UPDATE sync_info SET last_modified = ? WHERE id = 1",
                vec![Value::Integer(42)],
            )
            .await
            .unwrap();
        let exported = session.export().await.unwrap();
        drop(session);

        let reopened = Session::open(&exported).await.unwrap();
        let rows = reopened
            .execute("SELECT last_modified FROM sync_info WHERE id = 1", Vec::new())
            .await
            .unwrap();
        assert_eq!(rows.first().unwrap().get_i64("last_modified").unwrap(), 42);
    }

    #[tokio::test]
    async fn test_missing_tables() {
        let session = Session::open(&fixture_bytes()).await.unwrap();
        let missing = session
            .missing_tables(&["thinks", "bookmarks", "attachments"])
            .await
            .unwrap();
        assert_eq!(missing, vec!["attachments".to_string()]);
    }
}
