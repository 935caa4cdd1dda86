//! Harvest statistics
//!
//! Summarizes the state of a run or of a saved checkpoint for display.

use crate::state::CrawlState;
use crate::storage::Checkpoint;
use std::collections::BTreeMap;

/// Harvest statistics summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarvestStatistics {
    /// Category the records were harvested from
    pub category_url: String,

    /// When the numbers were captured (checkpoint timestamp), if known
    pub captured_at: Option<String>,

    /// Records in the accumulation set
    pub total_records: usize,

    /// URLs whose records are final
    pub processed: usize,

    /// Records kept without their detail fields
    pub partial: usize,

    /// URLs that exhausted their retries
    pub failed: usize,

    /// How many records carry each field
    pub field_coverage: BTreeMap<String, usize>,
}

impl HarvestStatistics {
    pub fn from_state(state: &CrawlState, category_url: &str) -> Self {
        let mut field_coverage = BTreeMap::new();
        let mut partial = 0;

        for record in state.records() {
            for field in record.field_names() {
                *field_coverage.entry(field.to_string()).or_insert(0) += 1;
            }
            if !record.url().is_some_and(|url| state.is_processed(url)) {
                partial += 1;
            }
        }

        Self {
            category_url: category_url.to_string(),
            captured_at: None,
            total_records: state.record_count(),
            processed: state.processed_count(),
            partial,
            failed: state.failed_urls().len(),
            field_coverage,
        }
    }

    pub fn from_checkpoint(checkpoint: Checkpoint) -> Self {
        let category_url = checkpoint.category_url.clone();
        let captured_at = Some(checkpoint.timestamp.clone()).filter(|t| !t.is_empty());
        let state = checkpoint.into_state();

        Self {
            captured_at,
            ..Self::from_state(&state, &category_url)
        }
    }

    /// Share of records that are final, as a percentage
    pub fn completion_rate(&self) -> f64 {
        if self.total_records == 0 {
            return 0.0;
        }
        (self.processed as f64 / self.total_records as f64) * 100.0
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Category: {}", stats.category_url);
    if let Some(captured_at) = &stats.captured_at {
        println!("  Checkpoint written: {}", captured_at);
    }
    println!("  Total listings: {}", stats.total_records);
    println!("  Processed URLs: {}", stats.processed);
    println!("  Partial listings: {}", stats.partial);
    println!("  Failed URLs: {}", stats.failed);
    println!();

    if !stats.field_coverage.is_empty() {
        println!("Field Coverage:");
        // Most common fields first
        let mut coverage: Vec<_> = stats.field_coverage.iter().collect();
        coverage.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (field, count) in coverage {
            let percentage = (*count as f64 / stats.total_records.max(1) as f64) * 100.0;
            println!("  {}: {} ({:.1}%)", field, count, percentage);
        }
        println!();
    }

    println!(
        "Completion Rate: {:.1}% ({} / {} listings enriched)",
        stats.completion_rate(),
        stats.processed,
        stats.total_records
    );
}
