//! Pagination discovery
//!
//! Decides how many index pages a run covers. When the category's first
//! page carries page navigation, the highest page number it mentions is
//! used. Otherwise the run falls back to a fixed upper bound and relies on
//! the index crawler stopping at the first empty page.

use crate::crawler::fetcher::{FetchResult, Fetcher};
use crate::extract::ExtractError;
use regex::Regex;
use scraper::{Html, Selector};

/// Last page of a crawl range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndPage {
    /// Given up front
    Fixed(u32),
    /// Detected from the first page
    Auto,
}

/// Index pages covered by a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlRange {
    pub start: u32,
    pub end: EndPage,
}

impl CrawlRange {
    pub fn new(start: u32, end: Option<u32>) -> Self {
        Self {
            start,
            end: end.map(EndPage::Fixed).unwrap_or(EndPage::Auto),
        }
    }
}

/// Outcome of last-page detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastPage {
    /// Highest page number found in the page navigation
    Detected(u32),
    /// No usable navigation; probe up to this page until one is empty
    Fallback(u32),
}

impl LastPage {
    pub fn page(&self) -> u32 {
        match self {
            LastPage::Detected(page) | LastPage::Fallback(page) => *page,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, LastPage::Fallback(_))
    }
}

/// Result of probing the first page for pagination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub last_page: LastPage,

    /// First-page URL, if its fetch exhausted the retries
    pub failed_url: Option<String>,
}

/// Builds the URL of an index page
///
/// Page 1 is the category URL itself; later pages live under `/page/N/`.
pub fn page_url(category_url: &str, page: u32) -> String {
    let base = category_url.trim_end_matches('/');
    if page <= 1 {
        base.to_string()
    } else {
        format!("{}/page/{}/", base, page)
    }
}

/// Finds the last index page of a category
#[derive(Debug, Clone)]
pub struct PaginationDiscoverer {
    links: Selector,
    page_href: Regex,
    fallback: u32,
}

impl PaginationDiscoverer {
    /// Creates a discoverer
    ///
    /// # Arguments
    ///
    /// * `link_selector` - Selects the anchors of the page navigation
    /// * `fallback` - Upper bound used when no navigation is found
    pub fn new(link_selector: &str, fallback: u32) -> Result<Self, ExtractError> {
        Ok(Self {
            links: Selector::parse(link_selector)
                .map_err(|_| ExtractError::Selector(link_selector.to_string()))?,
            page_href: Regex::new(r"/page/(\d+)/").map_err(|e| ExtractError::Markup(e.to_string()))?,
            fallback,
        })
    }

    /// Scans page navigation markup for the highest page number
    ///
    /// Both link texts that are plain numbers and `/page/N/` references in
    /// link targets count. Returns `None` when there is no navigation or it
    /// only mentions the first page.
    pub fn scan(&self, html: &str) -> Option<u32> {
        let document = Html::parse_document(html);
        let mut max_page = 1;

        for link in document.select(&self.links) {
            let text = link.text().collect::<String>();
            let text = text.trim();
            if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(page) = text.parse::<u32>() {
                    max_page = max_page.max(page);
                }
            }

            if let Some(href) = link.value().attr("href") {
                for captures in self.page_href.captures_iter(href) {
                    if let Ok(page) = captures[1].parse::<u32>() {
                        max_page = max_page.max(page);
                    }
                }
            }
        }

        (max_page > 1).then_some(max_page)
    }

    /// Fetches the first page and determines the last page to crawl
    ///
    /// Never fails: a failed fetch or missing navigation degrades to the
    /// fallback bound. A first page that exhausted its retries is reported
    /// in [`Detection::failed_url`].
    pub async fn detect_last_page(&self, fetcher: &Fetcher, category_url: &str) -> Detection {
        tracing::info!("Detecting last page...");

        let url = page_url(category_url, 1);
        let mut failed_url = None;
        match fetcher.fetch(&url).await {
            FetchResult::Success { body, .. } => {
                if let Some(page) = self.scan(&body) {
                    tracing::info!("Detected last page from pagination: {}", page);
                    return Detection {
                        last_page: LastPage::Detected(page),
                        failed_url: None,
                    };
                }
            }
            FetchResult::Exhausted { error, .. } => {
                tracing::warn!("Could not fetch first page for pagination: {}", error);
                failed_url = Some(url);
            }
            FetchResult::Cancelled => {}
        }

        tracing::info!(
            "Could not detect pagination, will check up to page {} until empty",
            self.fallback
        );
        Detection {
            last_page: LastPage::Fallback(self.fallback),
            failed_url,
        }
    }
}
