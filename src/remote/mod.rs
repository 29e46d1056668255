mod webdav;

use std::fmt;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use url::Url;

use crate::error::{AppError, Result};

pub use webdav::WebDavStore;

/// Name of the shared database file inside the configured WebDAV folder.
pub const DATABASE_FILE: &str = "thinknote.db";

/// Content type sent with every upload.
pub const DATABASE_CONTENT_TYPE: &str = "application/x-sqlite3";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: String, password: String) -> Self {
        Self { username, password }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A WebDAV folder plus the credentials used to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    base_url: String,
    pub credentials: Credentials,
}

impl RemoteTarget {
    /// Fails with `Config` unless `base_url` is an absolute http(s) URL
    /// without embedded credentials.
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self> {
        let base_url = normalize_url(base_url);
        let parsed = Url::parse(&base_url)
            .map_err(|e| AppError::Config(format!("invalid WebDAV URL {}: {}", base_url, e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(AppError::Config(format!(
                "WebDAV URL must start with http:// or https://, got {}",
                base_url
            )));
        }
        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(AppError::Config(
                "WebDAV URL must not contain credentials, set username and password instead"
                    .to_string(),
            ));
        }
        Ok(Self {
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, DATABASE_FILE)
    }
}

/// Whole-file transport for the shared database.
///
/// There is no locking and no version check: whoever uploads last wins, and
/// a concurrent writer that downloaded before that upload loses its change
/// when it uploads in turn.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Download the current database. Fails with `RemoteUnavailable`.
    async fn fetch_database(&self, target: &RemoteTarget) -> Result<Vec<u8>>;

    /// Overwrite the remote database. Fails with `RemoteWriteFailed`.
    async fn store_database(&self, target: &RemoteTarget, bytes: Vec<u8>) -> Result<()>;
}

/// Strip surrounding whitespace and trailing slashes, then collapse every run of slashes that is not
/// the `scheme://` separator into one.
pub fn normalize_url(raw: &str) -> String {
    static DUPLICATE_SLASHES: OnceLock<Regex> = OnceLock::new();
    let re = DUPLICATE_SLASHES
        .get_or_init(|| Regex::new(r"([^:]/)/+").expect("duplicate slash pattern is valid"));

    let trimmed = raw
        .trim_start()
        .trim_end_matches(|c: char| c == '/' || c.is_whitespace());
    re.replace_all(trimmed, "$1").into_owned()
}
