//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `Record`: one listing as an open field → value mapping
//! - `CrawlState`: the dedup ledger, accumulated records and failed URLs of a run

mod crawl_state;
mod record;

// Re-export main types
pub use crawl_state::{Applied, CrawlState};
pub use record::{Record, URL_FIELD};
