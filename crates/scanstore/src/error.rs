//! Error types for the row codec, the session file codec, and the store.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced when a single row cannot be turned back into an entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("column {column}: cannot parse {value:?}")]
    InvalidField { column: &'static str, value: String },

    #[error("column {column}: unknown code {code}")]
    UnknownCode { column: &'static str, code: i64 },
}

/// Errors produced while reading or writing a session file.
///
/// Any of these aborts the whole operation; callers never see partial results
/// alongside an error.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("binary record could not be decoded: {0}")]
    Binary(#[from] bincode::Error),

    #[error("stream ended inside section '{section}'")]
    Truncated { section: String },

    #[error("malformed session stream at {location}: {message}")]
    Malformed { location: String, message: String },

    /// Refused before anything was written for this section.
    #[error("cannot encode '{variable}': {message}")]
    Unencodable { variable: String, message: String },
}

impl CodecError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by [`crate::SessionStore`] operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("'{0}' is a reserved variable name and cannot be used for a task")]
    ReservedName(String),

    #[error("checkpoint label '{0}' must be a plain file name fragment")]
    InvalidLabel(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}
