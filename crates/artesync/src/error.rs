//! Engine-specific error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during synchronization.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to read registry directory '{path}': {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{location}': {message}")]
    Parse { location: String, message: String },

    #[error("Store operation failed: {0}")]
    Store(String),

    #[error("No synchronizer registered for artefact type '{0}'")]
    UnknownArtefactType(String),

    #[error("No priority tier assigned to artefact type '{0}'")]
    NoPriorityTier(String),

    #[error("Synchronizer for artefact type '{0}' is already registered")]
    DuplicateSynchronizer(String),

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("Registry root not found: {0}")]
    RegistryRootNotFound(PathBuf),
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Store(err.to_string())
    }
}

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
