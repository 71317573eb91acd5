//! Error types of the tracking core. Binaries wrap these into [anyhow::Error].

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors surfaced by [SessionTracker](crate::tracker::SessionTracker) and the stores it
/// composes. None of them should take the host process down.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The time log exists but can't be trusted. The file is left as is.
    #[error("Failed to load time log {path}: {details}")]
    LogLoad { path: PathBuf, details: String },

    #[error("Failed to save time log {path}: {source}")]
    LogSave {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("Session tracker has not been initialized")]
    NotInitialized,
}

/// Errors of a [CheckpointStore](crate::storage::checkpoint::CheckpointStore).
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("No checkpoint stored under {0}")]
    NotFound(String),

    #[error("Checkpoint store is unavailable: {0}")]
    Unavailable(#[from] io::Error),

    #[error("Checkpoint {key} holds an unreadable timestamp {value:?}: {source}")]
    Malformed {
        key: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Checkpoint registry is corrupted: {0}")]
    Registry(#[from] serde_json::Error),
}
