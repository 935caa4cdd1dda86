//! Output module for persisting harvested listings
//!
//! This module handles:
//! - Naming the files a run writes
//! - Writing the dataset (CSV) with a JSON fallback dump
//! - Writing the list of URLs that could not be fetched
//! - Summarizing harvest statistics

mod csv_writer;
mod paths;
pub mod stats;
mod traits;

pub use csv_writer::{column_order, OutputWriter, PRIORITY_COLUMNS};
pub use paths::{category_name, OutputPaths};
pub use stats::{print_statistics, HarvestStatistics};
pub use traits::{OutputError, OutputResult};
