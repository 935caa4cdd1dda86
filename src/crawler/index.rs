//! Index crawler
//!
//! Fetches the category's index pages concurrently, hands each page to the
//! extractor, and returns the item summaries not yet processed. Results are
//! consumed in page order; the first empty page after the start page marks
//! the end of the category.

use crate::crawler::fetcher::{FetchResult, Fetcher};
use crate::crawler::pagination::page_url;
use crate::extract::Extractor;
use crate::state::{CrawlState, Record};
use futures::future::join_all;
use std::collections::HashSet;

/// What an index crawl produced
#[derive(Debug, Default)]
pub struct IndexOutcome {
    /// New item summaries, in page order, unique by URL
    pub summaries: Vec<Record>,

    /// Index page URLs that exhausted their retries
    pub failed_pages: Vec<String>,

    /// Pages fetched and consumed
    pub pages_consumed: u32,

    /// Summaries dropped because their URL was already processed
    pub skipped_processed: usize,

    /// First empty page after the start page, if one was seen
    pub exhausted_at: Option<u32>,

    /// Shutdown was requested during the crawl
    pub cancelled: bool,
}

/// Crawls a range of index pages
pub struct IndexCrawler<'a> {
    fetcher: &'a Fetcher,
    extractor: &'a dyn Extractor,
    category_url: &'a str,
    wave_size: usize,
}

impl<'a> IndexCrawler<'a> {
    /// Creates an index crawler
    ///
    /// `wave_size` is the number of pages dispatched per pass; 0 dispatches
    /// the whole range in a single pass.
    pub fn new(
        fetcher: &'a Fetcher,
        extractor: &'a dyn Extractor,
        category_url: &'a str,
        wave_size: usize,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            category_url,
            wave_size,
        }
    }

    /// Crawls pages `start..=end`
    ///
    /// All pages of a pass are dispatched before any result is awaited, so
    /// a slow or failing page never blocks the others. Once a page after
    /// `start` yields no items, the rest of that pass is awaited but not
    /// consumed, and no further pass is scheduled.
    pub async fn crawl(&self, start: u32, end: u32, state: &CrawlState) -> IndexOutcome {
        let mut outcome = IndexOutcome::default();
        let pages: Vec<u32> = (start..=end).collect();
        if pages.is_empty() {
            return outcome;
        }

        let wave_size = if self.wave_size == 0 {
            pages.len()
        } else {
            self.wave_size
        };
        let mut seen: HashSet<String> = HashSet::new();

        tracing::info!("Crawling index pages {} to {}", start, end);

        'waves: for wave in pages.chunks(wave_size) {
            if self.fetcher.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            let fetches = wave.iter().map(|&page| {
                let url = page_url(self.category_url, page);
                async move {
                    let result = self.fetcher.fetch(&url).await;
                    (page, url, result)
                }
            });
            let results = join_all(fetches).await;

            for (page, url, result) in results {
                if self.fetcher.is_cancelled() {
                    outcome.cancelled = true;
                    break 'waves;
                }

                let body = match result {
                    FetchResult::Success { body, .. } => body,
                    FetchResult::Exhausted { .. } => {
                        outcome.failed_pages.push(url);
                        continue;
                    }
                    FetchResult::Cancelled => {
                        outcome.cancelled = true;
                        break 'waves;
                    }
                };
                outcome.pages_consumed += 1;

                let items = match self.extractor.parse_page(&body) {
                    Ok(items) => items,
                    Err(e) => {
                        tracing::warn!("Skipping index page {}: {}", page, e);
                        continue;
                    }
                };

                if items.is_empty() {
                    tracing::warn!("No listings found on page {}", page);
                    if page > start {
                        tracing::info!("Stopping at page {} (empty page)", page);
                        outcome.exhausted_at = Some(page);
                        break 'waves;
                    }
                    continue;
                }

                tracing::info!("Extracted {} listings from page {}", items.len(), page);
                for item in items {
                    let Some(item_url) = item.url().map(str::to_string) else {
                        tracing::debug!("Dropping summary without url on page {}", page);
                        continue;
                    };
                    if state.is_processed(&item_url) {
                        outcome.skipped_processed += 1;
                        continue;
                    }
                    if seen.insert(item_url) {
                        outcome.summaries.push(item);
                    }
                }
            }
        }

        tracing::info!(
            "Total listing cards extracted: {} ({} already processed)",
            outcome.summaries.len(),
            outcome.skipped_processed
        );
        outcome
    }
}
