//! JSON checkpoint file
//!
//! Layout:
//!
//! ```json
//! {
//!   "processed_urls": ["..."],
//!   "listings": [{"url": "...", "title": "..."}],
//!   "failed_urls": ["..."],
//!   "timestamp": "2025-01-01T12:00:00+04:00",
//!   "category_url": "https://..."
//! }
//! ```

use crate::state::{CrawlState, Record};
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Point-in-time snapshot of a run's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub processed_urls: Vec<String>,

    #[serde(default)]
    pub listings: Vec<Record>,

    #[serde(default)]
    pub failed_urls: Vec<String>,

    /// ISO-8601 wall-clock time of the snapshot
    #[serde(default)]
    pub timestamp: String,

    #[serde(default)]
    pub category_url: String,
}

impl Checkpoint {
    /// Captures the current state of a run
    pub fn capture(state: &CrawlState, category_url: &str) -> Self {
        Self {
            processed_urls: state.processed_urls(),
            listings: state.records().to_vec(),
            failed_urls: state.failed_urls().to_vec(),
            timestamp: Local::now().to_rfc3339(),
            category_url: category_url.to_string(),
        }
    }

    /// Rebuilds run state from this snapshot
    pub fn into_state(self) -> CrawlState {
        CrawlState::restore(self.processed_urls, self.listings, self.failed_urls)
    }
}

/// Checkpoint store backed by a single JSON file
#[derive(Debug, Clone)]
pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn load(&self) -> StorageResult<Option<Checkpoint>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(&self.path, e)),
        };

        let checkpoint =
            serde_json::from_str(&content).map_err(|e| StorageError::Corrupt {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })?;

        Ok(Some(checkpoint))
    }

    fn save(&self, checkpoint: &Checkpoint) -> StorageResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(parent, e))?;
        }

        let json = serde_json::to_vec_pretty(checkpoint)?;

        // Write beside the target, then rename over it.
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).map_err(|e| self.io_error(&temp_path, e))?;
            file.write_all(&json)
                .and_then(|_| file.sync_all())
                .map_err(|e| self.io_error(&temp_path, e))?;
        }
        fs::rename(&temp_path, &self.path).map_err(|e| self.io_error(&self.path, e))?;

        tracing::debug!(
            "Checkpoint saved to {}: {} listings, {} processed",
            self.path.display(),
            checkpoint.listings.len(),
            checkpoint.processed_urls.len()
        );
        Ok(())
    }
}
