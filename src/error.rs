//! Error Types
//!
//! Library-level error taxonomy. Per-artifact storage failures are
//! non-fatal to a cleanup pass (they are counted and logged); only
//! configuration errors are fatal, and only at startup.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the artifact store and cleanup core
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure reading, writing, or deleting an artifact
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Artifact metadata could not be decoded
    #[error("corrupt metadata for session {session_id}: {source}")]
    CorruptMetadata {
        session_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// Targeted operation referenced a session absent from the store
    #[error("session {0} not found")]
    NotFound(String),

    /// Invalid configuration, surfaced before the scheduler starts
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Storage {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means "the thing is already gone"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
