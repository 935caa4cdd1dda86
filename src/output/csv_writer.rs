//! Dataset writer
//!
//! Records are semi-structured, so the column set is the union of all field
//! names. Well-known fields come first in a fixed order, everything else
//! follows alphabetically. The file starts with a UTF-8 byte-order mark so
//! spreadsheet tools detect the encoding.

use crate::output::paths::OutputPaths;
use crate::output::traits::{OutputError, OutputResult};
use crate::state::Record;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Columns placed first, in this order, when present
pub const PRIORITY_COLUMNS: &[&str] = &[
    "listing_id",
    "listing_number",
    "title",
    "price",
    "price_value",
    "price_currency",
    "city",
    "location",
    "property_type",
    "listing_type",
    "building_type",
    "area_sqm",
    "rooms",
    "room_count",
    "floor",
    "total_floors",
    "description",
    "owner_name",
    "phone",
    "url",
    "listing_date",
    "posted_date",
    "views",
    "image_count",
    "thumbnail",
    "all_images",
];

/// Computes the header row for a set of records
///
/// Depends only on the set of field names, never on record order.
pub fn column_order(records: &[Record]) -> Vec<String> {
    let mut remaining: BTreeSet<&str> = records
        .iter()
        .flat_map(|record| record.field_names())
        .collect();

    let mut columns = Vec::with_capacity(remaining.len());
    for column in PRIORITY_COLUMNS {
        if remaining.remove(column) {
            columns.push(column.to_string());
        }
    }
    columns.extend(remaining.into_iter().map(str::to_string));
    columns
}

/// Writes the dataset, its fallback dump and the failed-URL list
#[derive(Debug, Clone)]
pub struct OutputWriter {
    dataset: PathBuf,
    backup: PathBuf,
    failed_urls: PathBuf,
}

impl OutputWriter {
    pub fn new(paths: &OutputPaths) -> Self {
        Self {
            dataset: paths.dataset.clone(),
            backup: paths.backup.clone(),
            failed_urls: paths.failed_urls.clone(),
        }
    }

    pub fn dataset_path(&self) -> &Path {
        &self.dataset
    }

    /// Writes all records to the dataset file, replacing earlier contents
    ///
    /// Returns `Ok(None)` when there is nothing to write. If the dataset
    /// cannot be written, the records are dumped as JSON to the backup path
    /// before the error is returned.
    pub fn flush(&self, records: &[Record]) -> OutputResult<Option<PathBuf>> {
        if records.is_empty() {
            tracing::warn!("No listings to save");
            return Ok(None);
        }

        match write_csv(&self.dataset, records) {
            Ok(()) => {
                tracing::info!(
                    "Saved {} listings to {}",
                    records.len(),
                    self.dataset.display()
                );
                Ok(Some(self.dataset.clone()))
            }
            Err(e) => {
                tracing::error!("Error saving to CSV: {}", e);
                let backup = match write_json(&self.backup, records) {
                    Ok(()) => {
                        tracing::info!("Saved backup to {}", self.backup.display());
                        Some(self.backup.clone())
                    }
                    Err(e2) => {
                        tracing::error!("Error saving backup: {}", e2);
                        None
                    }
                };
                Err(OutputError::Dataset {
                    path: self.dataset.clone(),
                    reason: e.to_string(),
                    backup,
                })
            }
        }
    }

    /// Writes failed URLs one per line; returns `Ok(None)` when there are none
    pub fn write_failed_urls(&self, urls: &[String]) -> OutputResult<Option<PathBuf>> {
        if urls.is_empty() {
            return Ok(None);
        }

        let mut content = urls.join("\n");
        content.push('\n');
        std::fs::write(&self.failed_urls, content)
            .map_err(|e| OutputError::io(&self.failed_urls, e))?;

        tracing::info!(
            "Saved {} failed URLs to {}",
            urls.len(),
            self.failed_urls.display()
        );
        Ok(Some(self.failed_urls.clone()))
    }
}

fn write_csv(path: &Path, records: &[Record]) -> OutputResult<()> {
    let columns = column_order(records);

    let mut file = BufWriter::new(File::create(path).map_err(|e| OutputError::io(path, e))?);
    file.write_all(UTF8_BOM)
        .map_err(|e| OutputError::io(path, e))?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(&columns)?;
    for record in records {
        writer.write_record(
            columns
                .iter()
                .map(|column| record.get(column).unwrap_or("")),
        )?;
    }
    writer.flush().map_err(|e| OutputError::io(path, e))?;
    Ok(())
}

fn write_json(path: &Path, records: &[Record]) -> OutputResult<()> {
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json).map_err(|e| OutputError::io(path, e))
}
