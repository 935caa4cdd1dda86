use crate::config::types::{Config, CrawlerConfig, ExtractorConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_extractor_config(&config.extractor)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.category_url).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Invalid category_url '{}': {}",
            config.category_url, e
        ))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "category_url '{}' must use http or https",
            config.category_url
        )));
    }

    if config.start_page < 1 {
        return Err(ConfigError::Validation(
            "start_page must be >= 1".to_string(),
        ));
    }

    if let Some(end_page) = config.end_page {
        if end_page < config.start_page {
            return Err(ConfigError::Validation(format!(
                "end_page ({}) must be >= start_page ({})",
                end_page, config.start_page
            )));
        }
    }

    if config.max_concurrent < 1 || config.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent must be between 1 and 100, got {}",
            config.max_concurrent
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    if config.checkpoint_interval < 1 {
        return Err(ConfigError::Validation(
            "checkpoint_interval must be >= 1".to_string(),
        ));
    }

    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(
            "request_timeout must be >= 1 second".to_string(),
        ));
    }

    if config.fallback_last_page < 1 {
        return Err(ConfigError::Validation(
            "fallback_last_page must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates that every extractor selector parses
fn validate_extractor_config(config: &ExtractorConfig) -> Result<(), ConfigError> {
    let selectors = [
        ("card", &config.card),
        ("card-link", &config.card_link),
        ("card-title", &config.card_title),
        ("card-image", &config.card_image),
        ("card-price", &config.card_price),
        ("price-value", &config.price_value),
        ("price-currency", &config.price_currency),
        ("card-date", &config.card_date),
        ("card-bookmark", &config.card_bookmark),
        ("detail-price", &config.detail_price),
        ("property-row", &config.property_row),
        ("property-label", &config.property_label),
        ("property-value", &config.property_value),
        ("description", &config.description),
        ("gallery-image", &config.gallery_image),
        ("statistics-item", &config.statistics_item),
        ("owner-name", &config.owner_name),
        ("phone", &config.phone),
        ("pagination", &config.pagination),
    ];

    for (field, selector) in selectors {
        if Selector::parse(selector).is_err() {
            return Err(ConfigError::InvalidSelector {
                field: field.to_string(),
                selector: selector.clone(),
            });
        }
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
