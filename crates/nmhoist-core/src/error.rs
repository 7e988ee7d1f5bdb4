use std::path::PathBuf;
use thiserror::Error;

/// Core error type for nmhoist operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse module listing: {0}")]
    ListingParse(#[source] serde_json::Error),

    #[error("Invalid module listing: {0}")]
    InvalidListing(String),

    #[error("Module '{name}' already exists among its siblings")]
    DuplicateChild { name: String },

    #[error("Can't find dependency '{name}' for {module}")]
    UnresolvedReference { name: String, module: String },

    #[error("Invalid ignore pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },

    #[error("Package manager `{command}` failed (exit code {code}): {stderr}")]
    PackageManager {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Result alias used throughout the core crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
