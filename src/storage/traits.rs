//! Checkpoint store trait and error types

use crate::storage::Checkpoint;
use thiserror::Error;

/// Errors that can occur during checkpoint operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Checkpoint at {path} is corrupt: {message}")]
    Corrupt { path: String, message: String },
}

/// Result type for checkpoint operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable home of the run's checkpoint
///
/// Each save replaces the previous snapshot in full.
pub trait CheckpointStore: Send + Sync {
    /// Loads the most recent snapshot
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Checkpoint))` - A snapshot exists
    /// * `Ok(None)` - No snapshot has been written yet
    /// * `Err(StorageError)` - A snapshot exists but could not be read
    fn load(&self) -> StorageResult<Option<Checkpoint>>;

    /// Writes a snapshot, replacing any previous one
    fn save(&self, checkpoint: &Checkpoint) -> StorageResult<()>;
}
