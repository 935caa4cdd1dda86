//! Output error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to format output: {0}")]
    Format(#[from] serde_json::Error),

    /// The dataset could not be written; `backup` is set when the fallback
    /// dump succeeded
    #[error("Failed to write dataset {}: {reason}", path.display())]
    Dataset {
        path: PathBuf,
        reason: String,
        backup: Option<PathBuf>,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

impl OutputError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OutputError::Io {
            path: path.into(),
            source,
        }
    }
}
