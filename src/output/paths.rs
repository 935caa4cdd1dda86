//! File naming for a run's outputs

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use url::Url;

/// Name used when the category URL has no path segment
const DEFAULT_CATEGORY: &str = "listings";

/// Derives the category name from a category URL
///
/// The last non-empty path segment is used, e.g. `dasinmaz-emlak` for
/// `https://aratap.az/dasinmaz-emlak/`.
pub fn category_name(category_url: &str) -> String {
    Url::parse(category_url)
        .ok()
        .and_then(|url| {
            url.path_segments()?
                .filter(|segment| !segment.is_empty())
                .last()
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
}

/// Where a run reads and writes its files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Stable across runs, so a later run can resume from it
    pub checkpoint: PathBuf,
    pub dataset: PathBuf,
    pub failed_urls: PathBuf,
    pub backup: PathBuf,
}

impl OutputPaths {
    /// Builds the paths for a run started at `started`
    pub fn new(directory: impl AsRef<Path>, category_url: &str, started: DateTime<Local>) -> Self {
        let directory = directory.as_ref();
        let category = category_name(category_url);
        let stamp = started.format("%Y%m%d_%H%M%S");

        Self {
            checkpoint: directory.join(format!("{}_checkpoint.json", category)),
            dataset: directory.join(format!("{}_listings_{}.csv", category, stamp)),
            failed_urls: directory.join(format!("{}_failed_urls_{}.txt", category, stamp)),
            backup: directory.join(format!("{}_listings_{}_backup.json", category, stamp)),
        }
    }
}
