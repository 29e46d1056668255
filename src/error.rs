use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Please configure WebDAV settings first")]
    MissingConfig,

    #[error("{0}")]
    Validation(String),

    #[error("Failed to download database: {0}")]
    RemoteUnavailable(String),

    #[error("Downloaded file is not a valid database: {0}")]
    CorruptDatabase(String),

    #[error("Failed to upload updated database: {0}")]
    RemoteWriteFailed(String),

    #[error("Cancelled: {0}")]
    UserCancelled(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<tokio_rusqlite::Error> for AppError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Database(format!("JSON error: {}", err))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

/// The outcome taxonomy reported back to whatever surface triggered a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    ValidationError,
    MissingConfig,
    RemoteUnavailable,
    CorruptDatabase,
    RemoteWriteFailed,
    UserCancelled,
    DatabaseError,
    ConfigError,
    IoError,
}

impl OutcomeKind {
    /// Process exit code used by the CLI for this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            OutcomeKind::Success => 0,
            OutcomeKind::ValidationError => 2,
            OutcomeKind::MissingConfig => 3,
            OutcomeKind::RemoteUnavailable => 4,
            OutcomeKind::CorruptDatabase => 5,
            OutcomeKind::RemoteWriteFailed => 6,
            OutcomeKind::UserCancelled => 7,
            OutcomeKind::DatabaseError => 8,
            OutcomeKind::ConfigError => 9,
            OutcomeKind::IoError => 10,
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutcomeKind::Success => "success",
            OutcomeKind::ValidationError => "validation error",
            OutcomeKind::MissingConfig => "missing config",
            OutcomeKind::RemoteUnavailable => "remote unavailable",
            OutcomeKind::CorruptDatabase => "corrupt database",
            OutcomeKind::RemoteWriteFailed => "remote write failed",
            OutcomeKind::UserCancelled => "cancelled",
            OutcomeKind::DatabaseError => "database error",
            OutcomeKind::ConfigError => "config error",
            OutcomeKind::IoError => "io error",
        };
        f.write_str(name)
    }
}

impl AppError {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            AppError::MissingConfig => OutcomeKind::MissingConfig,
            AppError::Validation(_) => OutcomeKind::ValidationError,
            AppError::RemoteUnavailable(_) => OutcomeKind::RemoteUnavailable,
            AppError::CorruptDatabase(_) => OutcomeKind::CorruptDatabase,
            AppError::RemoteWriteFailed(_) => OutcomeKind::RemoteWriteFailed,
            AppError::UserCancelled(_) => OutcomeKind::UserCancelled,
            AppError::Database(_) => OutcomeKind::DatabaseError,
            AppError::Config(_) => OutcomeKind::ConfigError,
            AppError::Io(_) => OutcomeKind::IoError,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
