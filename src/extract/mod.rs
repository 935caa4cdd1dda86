//! Page content → record extraction
//!
//! The harvester treats extraction as a swappable collaborator: anything
//! implementing [`Extractor`] can turn fetched index and detail pages into
//! records. [`HtmlExtractor`] is the bundled CSS-selector implementation.

mod html;
mod labels;

pub use html::HtmlExtractor;
pub use labels::LabelMap;

use crate::state::Record;
use thiserror::Error;

/// Errors raised while extracting records from a page
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid CSS selector '{0}'")]
    Selector(String),

    #[error("Invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),

    #[error("Unexpected markup: {0}")]
    Markup(String),
}

/// Turns fetched page content into records
///
/// Implementations must be pure: the same content always yields the same
/// records, and no I/O happens during extraction.
pub trait Extractor: Send + Sync {
    /// Extracts item summaries from an index page
    ///
    /// Every returned record must carry a `url` field pointing at the
    /// item's detail page. An empty vector means the page lists no items.
    fn parse_page(&self, content: &str) -> Result<Vec<Record>, ExtractError>;

    /// Extracts detail fields from an item's detail page
    fn parse_detail(&self, content: &str, url: &str) -> Result<Record, ExtractError>;
}
