//! Crawler module for fetching and harvesting listings
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with retry logic and a concurrency gate
//! - Pagination discovery
//! - Index page crawling and detail enrichment
//! - Overall run coordination

mod coordinator;
mod enricher;
mod fetcher;
mod gate;
mod index;
mod pagination;

pub use coordinator::{run_harvest, Harvester, RunReport, RunStatus};
pub use enricher::{DetailEnricher, Enrichment};
pub use fetcher::{build_http_client, FetchError, FetchResult, Fetcher, RetryPolicy};
pub use gate::{ConcurrencyGate, GatePermit};
pub use index::{IndexCrawler, IndexOutcome};
pub use pagination::{page_url, CrawlRange, Detection, EndPage, LastPage, PaginationDiscoverer};
