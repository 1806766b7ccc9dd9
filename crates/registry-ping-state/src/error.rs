//! Error types for registry-ping-state

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing persisted state
#[derive(Error, Debug)]
pub enum StateError {
    /// Reading or writing the backing file failed
    #[error("state io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file exists but is not a valid state document
    #[error("state file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The in-memory mapping could not be serialized
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The blocking I/O task panicked or was aborted
    #[error("state task failed: {0}")]
    Join(String),
}

impl StateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StateError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<tokio::task::JoinError> for StateError {
    fn from(err: tokio::task::JoinError) -> Self {
        StateError::Join(err.to_string())
    }
}
