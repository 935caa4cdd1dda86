use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Listing category whose index pages are crawled
    pub category_url: String,

    /// First index page to crawl
    #[serde(default = "default_start_page")]
    pub start_page: u32,

    /// Last index page to crawl; absent means auto-detect
    #[serde(default)]
    pub end_page: Option<u32>,

    /// Maximum number of fetches in flight at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,

    /// Whether to visit each item's detail page
    #[serde(default = "default_true")]
    pub fetch_details: bool,

    /// Retries after the initial attempt before a URL is given up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Write a checkpoint every N enriched items
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u32,

    /// Load the previous checkpoint at startup
    #[serde(default = "default_true")]
    pub resume: bool,

    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Backoff unit (milliseconds); retry k waits `backoff_base * 2^k`
    #[serde(default = "default_backoff_base")]
    pub backoff_base: u64,

    /// Upper page bound used when pagination cannot be detected
    #[serde(default = "default_fallback_last_page")]
    pub fallback_last_page: u32,

    /// Index pages dispatched per pass; 0 dispatches the whole range at once
    #[serde(default)]
    pub index_wave_size: u32,
}

impl CrawlerConfig {
    /// Creates a crawler configuration for `category_url` with default settings
    pub fn for_category(category_url: impl Into<String>) -> Self {
        Self {
            category_url: category_url.into(),
            start_page: default_start_page(),
            end_page: None,
            max_concurrent: default_max_concurrent(),
            fetch_details: true,
            max_retries: default_max_retries(),
            checkpoint_interval: default_checkpoint_interval(),
            resume: true,
            request_timeout: default_request_timeout(),
            backoff_base: default_backoff_base(),
            fallback_last_page: default_fallback_last_page(),
            index_wave_size: 0,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the checkpoint, dataset and failed-URL files
    #[serde(default = "default_output_directory")]
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

/// CSS selectors for the bundled HTML extractor
///
/// The defaults match the aratap.az listing markup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ExtractorConfig {
    pub card: String,
    pub card_link: String,
    pub card_title: String,
    pub card_image: String,
    pub card_price: String,
    pub price_value: String,
    pub price_currency: String,
    pub card_date: String,
    pub card_bookmark: String,
    pub detail_price: String,
    pub property_row: String,
    pub property_label: String,
    pub property_value: String,
    pub description: String,
    pub gallery_image: String,
    pub statistics_item: String,
    pub owner_name: String,
    pub phone: String,
    pub pagination: String,

    /// Extra property label → field name mappings
    pub labels: BTreeMap<String, String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            card: "div.products-i".to_string(),
            card_link: "a.products-link".to_string(),
            card_title: "div.products-name".to_string(),
            card_image: "img".to_string(),
            card_price: "div.products-price".to_string(),
            price_value: "span.price-val".to_string(),
            price_currency: "span.price-cur".to_string(),
            card_date: "div.products-created".to_string(),
            card_bookmark: "a.add_bookmark".to_string(),
            detail_price: "div.product-price".to_string(),
            property_row: "div.product-properties__i".to_string(),
            property_label: "label.product-properties__i-name".to_string(),
            property_value: "span.product-properties__i-value".to_string(),
            description: "div.product-description__content div[style*=\"pre-wrap\"]"
                .to_string(),
            gallery_image: "ul.xfieldimagegallery img".to_string(),
            statistics_item: "div.product-info__statistics div.product-info__statistics__i"
                .to_string(),
            owner_name: "div.product-owner__info div.product-owner__info-name".to_string(),
            phone: "span.phone_number".to_string(),
            pagination: "div.navigation a, ul.pagination a".to_string(),
            labels: BTreeMap::new(),
        }
    }
}

fn default_start_page() -> u32 {
    1
}

fn default_max_concurrent() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_checkpoint_interval() -> u32 {
    50
}

fn default_request_timeout() -> u64 {
    30
}

fn default_backoff_base() -> u64 {
    1000
}

fn default_fallback_last_page() -> u32 {
    100
}

fn default_output_directory() -> String {
    ".".to_string()
}
