//! Detail enrichment
//!
//! Fetches an item's detail page and merges the extracted fields onto its
//! summary. The enricher never touches the crawl state; it reports what
//! happened and the controller applies it.

use crate::crawler::fetcher::{FetchResult, Fetcher};
use crate::extract::Extractor;
use crate::state::Record;

/// Result of enriching one summary
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    /// Detail fields merged onto the summary; the record is final
    Merged(Record),

    /// The detail page was fetched but could not be extracted; the summary
    /// is the final record
    Unextracted(Record),

    /// The detail fetch exhausted its retries; the summary is kept as a
    /// partial record and the URL needs another attempt
    Failed { partial: Record, url: String },

    /// Shutdown was requested before or during the detail fetch; the
    /// summary must not be applied
    Cancelled,
}

/// Enriches summaries with their detail pages
pub struct DetailEnricher<'a> {
    fetcher: &'a Fetcher,
    extractor: &'a dyn Extractor,
}

impl<'a> DetailEnricher<'a> {
    pub fn new(fetcher: &'a Fetcher, extractor: &'a dyn Extractor) -> Self {
        Self { fetcher, extractor }
    }

    /// Enriches a single summary
    ///
    /// Detail fields override summary fields with the same name. A summary
    /// without a `url` cannot be enriched and is returned unchanged.
    pub async fn enrich(&self, summary: Record) -> Enrichment {
        if self.fetcher.is_cancelled() {
            return Enrichment::Cancelled;
        }

        let Some(url) = summary.url().map(str::to_string) else {
            return Enrichment::Unextracted(summary);
        };

        let body = match self.fetcher.fetch(&url).await {
            FetchResult::Success { body, .. } => body,
            FetchResult::Exhausted { .. } => {
                return Enrichment::Failed {
                    partial: summary,
                    url,
                }
            }
            FetchResult::Cancelled => return Enrichment::Cancelled,
        };
        if self.fetcher.is_cancelled() {
            tracing::debug!("Discarding detail page of {}: shutdown requested", url);
            return Enrichment::Cancelled;
        }

        match self.extractor.parse_detail(&body, &url) {
            Ok(detail) => {
                tracing::debug!("Merged {} detail fields for {}", detail.len(), url);
                Enrichment::Merged(summary.merged_with(detail))
            }
            Err(e) => {
                tracing::warn!("Could not extract details from {}: {}", url, e);
                Enrichment::Unextracted(summary)
            }
        }
    }
}
