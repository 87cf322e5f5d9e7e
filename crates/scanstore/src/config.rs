//! Store configuration with environment variable and file-based loading.
//!
//! Environment variables:
//! - `SCANSTORE_SESSION_DIR`: Directory for session checkpoints
//! - `SCANSTORE_CHECKPOINT_ENCODING`: `text`, `binary`, or `both`
//!
//! Default directory: `~/.scanstore/sessions`

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;
use crate::stream::SessionEncoding;

pub const SESSION_DIR_ENV: &str = "SCANSTORE_SESSION_DIR";
pub const CHECKPOINT_ENCODING_ENV: &str = "SCANSTORE_CHECKPOINT_ENCODING";

/// Which file(s) a checkpoint writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointEncoding {
    Text,
    Binary,
    #[default]
    Both,
}

impl CheckpointEncoding {
    pub fn encodings(self) -> &'static [SessionEncoding] {
        match self {
            Self::Text => &[SessionEncoding::Text],
            Self::Binary => &[SessionEncoding::Binary],
            Self::Both => &[SessionEncoding::Text, SessionEncoding::Binary],
        }
    }
}

impl FromStr for CheckpointEncoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "binary" | "dat" => Ok(Self::Binary),
            "both" => Ok(Self::Both),
            _ => Err(ConfigError::InvalidValue {
                key: CHECKPOINT_ENCODING_ENV,
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for CheckpointEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Both => "both",
        };
        f.write_str(name)
    }
}

/// Configuration for session persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory checkpoints are written into. Created on first checkpoint.
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,

    #[serde(default)]
    pub checkpoint_encoding: CheckpointEncoding,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            session_dir: default_session_dir(),
            checkpoint_encoding: CheckpointEncoding::default(),
        }
    }
}

/// Get the default session directory (~/.scanstore/sessions).
fn default_session_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".scanstore").join("sessions"))
        .unwrap_or_else(|| PathBuf::from(".scanstore/sessions"))
}

impl StoreConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let session_dir = env::var(SESSION_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_session_dir());

        let checkpoint_encoding = match env::var(CHECKPOINT_ENCODING_ENV) {
            Ok(value) => value.parse()?,
            Err(_) => CheckpointEncoding::default(),
        };

        Ok(Self {
            session_dir,
            checkpoint_encoding,
        })
    }

    /// Load configuration from a TOML file, falling back to environment.
    ///
    /// The file should contain a `[session]` section:
    /// ```toml
    /// [session]
    /// session_dir = "/data/neurofeedback/sessions"
    /// checkpoint_encoding = "both"
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        match table.get("session") {
            Some(section) => section.clone().try_into().map_err(|e: toml::de::Error| ConfigError::Parse {
                path: path.to_path_buf(),
                message: format!("[session]: {}", e),
            }),
            None => Self::from_env(),
        }
    }

    /// Create a config with a specific session directory.
    pub fn with_session_dir(path: impl Into<PathBuf>) -> Self {
        Self {
            session_dir: path.into(),
            checkpoint_encoding: CheckpointEncoding::default(),
        }
    }

    pub fn checkpoint_encoding(mut self, encoding: CheckpointEncoding) -> Self {
        self.checkpoint_encoding = encoding;
        self
    }
}
