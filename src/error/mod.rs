// Error types for llm-router
// Author: kelexine (https://github.com/kelexine)

use thiserror::Error;

/// Coarse classification of a [`RouterError`].
///
/// Callers match on the kind to decide whether to fall back, retry, or
/// propagate instead of inspecting message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BackendUnavailable,
    CorruptData,
    Serialization,
    Io,
    Config,
    InvalidRecord,
    UnknownProvider,
    Client,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BackendUnavailable => "backend_unavailable",
            ErrorKind::CorruptData => "corrupt_data",
            ErrorKind::Serialization => "serialization_error",
            ErrorKind::Io => "io_failure",
            ErrorKind::Config => "configuration_error",
            ErrorKind::InvalidRecord => "invalid_record",
            ErrorKind::UnknownProvider => "unknown_provider",
            ErrorKind::Client => "client_error",
        }
    }
}

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Cache backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Corrupt data in {path}: {reason}")]
    CorruptData { path: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config parsing error: {0}")]
    ConfigParsing(#[from] config::ConfigError),

    #[error("Invalid call record: {0}")]
    InvalidRecord(String),

    #[error("No client registered for provider '{0}'")]
    UnknownProvider(String),

    #[error("Model client error: {0}")]
    Client(String),
}

impl RouterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouterError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            RouterError::CorruptData { .. } => ErrorKind::CorruptData,
            RouterError::Serialization(_) => ErrorKind::Serialization,
            RouterError::Io(_) => ErrorKind::Io,
            RouterError::Config(_) | RouterError::ConfigParsing(_) => ErrorKind::Config,
            RouterError::InvalidRecord(_) => ErrorKind::InvalidRecord,
            RouterError::UnknownProvider(_) => ErrorKind::UnknownProvider,
            RouterError::Client(_) => ErrorKind::Client,
        }
    }
}

impl From<serde_json::Error> for RouterError {
    fn from(e: serde_json::Error) -> Self {
        RouterError::Serialization(e.to_string())
    }
}

impl From<redis::RedisError> for RouterError {
    fn from(e: redis::RedisError) -> Self {
        RouterError::BackendUnavailable(e.to_string())
    }
}

impl From<tempfile::PersistError> for RouterError {
    fn from(e: tempfile::PersistError) -> Self {
        RouterError::Io(e.error)
    }
}

pub type Result<T> = std::result::Result<T, RouterError>;
