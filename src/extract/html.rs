//! CSS-selector extractor for listing markup
//!
//! Index pages are a grid of listing cards, each linking to a detail page.
//! Detail pages carry a price block, a table of labelled properties, a
//! description, an image gallery, view statistics and owner contact.

use crate::config::ExtractorConfig;
use crate::extract::{ExtractError, Extractor, LabelMap};
use crate::state::{Record, URL_FIELD};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Month names (genitive) used in posted-date statistics
const MONTHS: &[&str] = &[
    "января", "февраля", "марта", "апреля", "мая", "июня", "июля", "августа", "сентября",
    "октября", "ноября", "декабря",
];

/// Compiled selectors
#[derive(Debug, Clone)]
struct Selectors {
    card: Selector,
    card_link: Selector,
    card_title: Selector,
    card_image: Selector,
    card_price: Selector,
    price_value: Selector,
    price_currency: Selector,
    card_date: Selector,
    card_bookmark: Selector,
    detail_price: Selector,
    property_row: Selector,
    property_label: Selector,
    property_value: Selector,
    description: Selector,
    gallery_image: Selector,
    statistics_item: Selector,
    owner_name: Selector,
    phone: Selector,
}

fn compile(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|_| ExtractError::Selector(selector.to_string()))
}

impl Selectors {
    fn compile(config: &ExtractorConfig) -> Result<Self, ExtractError> {
        Ok(Self {
            card: compile(&config.card)?,
            card_link: compile(&config.card_link)?,
            card_title: compile(&config.card_title)?,
            card_image: compile(&config.card_image)?,
            card_price: compile(&config.card_price)?,
            price_value: compile(&config.price_value)?,
            price_currency: compile(&config.price_currency)?,
            card_date: compile(&config.card_date)?,
            card_bookmark: compile(&config.card_bookmark)?,
            detail_price: compile(&config.detail_price)?,
            property_row: compile(&config.property_row)?,
            property_label: compile(&config.property_label)?,
            property_value: compile(&config.property_value)?,
            description: compile(&config.description)?,
            gallery_image: compile(&config.gallery_image)?,
            statistics_item: compile(&config.statistics_item)?,
            owner_name: compile(&config.owner_name)?,
            phone: compile(&config.phone)?,
        })
    }
}

/// Extractor driven by configurable CSS selectors
#[derive(Debug, Clone)]
pub struct HtmlExtractor {
    selectors: Selectors,
    labels: LabelMap,
    base_url: Url,
    views: Regex,
}

impl HtmlExtractor {
    /// Creates an extractor resolving relative item links against `base_url`
    pub fn new(config: &ExtractorConfig, base_url: &str) -> Result<Self, ExtractError> {
        Ok(Self {
            selectors: Selectors::compile(config)?,
            labels: LabelMap::with_overrides(&config.labels),
            base_url: Url::parse(base_url)?,
            views: Regex::new(r"(\d[\d\s]*)").map_err(|e| ExtractError::Markup(e.to_string()))?,
        })
    }

    /// Parses one listing card; `None` if it has no usable link
    fn parse_card(&self, card: ElementRef<'_>) -> Option<Record> {
        let link = card.select(&self.selectors.card_link).next()?;
        let url = resolve_link(link.value().attr("href")?, &self.base_url)?;

        let mut record = Record::with_url(url);
        record.insert(
            "title",
            first_text(link, &self.selectors.card_title).unwrap_or_default(),
        );

        if let Some(img) = link.select(&self.selectors.card_image).next() {
            record.insert("thumbnail", img.value().attr("src").unwrap_or_default());
        }

        if let Some(price) = link.select(&self.selectors.card_price).next() {
            let value = first_text(price, &self.selectors.price_value).unwrap_or_default();
            let currency = first_text(price, &self.selectors.price_currency).unwrap_or_default();
            record.insert("price", format!("{} {}", value, currency));
            record.insert("price_value", value);
            record.insert("price_currency", currency);
        }

        record.insert(
            "listing_date",
            first_text(link, &self.selectors.card_date).unwrap_or_default(),
        );

        if let Some(bookmark) = card.select(&self.selectors.card_bookmark).next() {
            record.insert(
                "listing_id",
                bookmark.value().attr("data-id").unwrap_or_default(),
            );
        }

        Some(record)
    }

    fn extract_properties(&self, document: &Html, record: &mut Record) {
        for row in document.select(&self.selectors.property_row) {
            let label = first_text(row, &self.selectors.property_label);
            let value = first_text(row, &self.selectors.property_value);

            if let (Some(label), Some(value)) = (label, value) {
                record.insert(self.labels.field_for(&label), value);
            }
        }
    }

    fn extract_statistics(&self, document: &Html, record: &mut Record) {
        for item in document.select(&self.selectors.statistics_item) {
            let text = element_text(item);

            if text.contains('№') {
                record.insert("listing_number", text.replace('№', "").trim());
            } else if MONTHS.iter().any(|month| text.contains(month)) {
                record.insert("posted_date", text);
            } else if text.contains("sayı") {
                if let Some(captures) = self.views.captures(&text) {
                    record.insert("views", captures[1].replace(' ', ""));
                }
            }
        }
    }
}

impl Extractor for HtmlExtractor {
    fn parse_page(&self, content: &str) -> Result<Vec<Record>, ExtractError> {
        let document = Html::parse_document(content);

        let cards: Vec<ElementRef<'_>> = document.select(&self.selectors.card).collect();
        tracing::debug!("Found {} listing cards", cards.len());

        let records = cards
            .into_iter()
            .filter_map(|card| {
                let record = self.parse_card(card);
                if record.is_none() {
                    tracing::debug!("Skipping listing card without a usable link");
                }
                record
            })
            .collect();

        Ok(records)
    }

    fn parse_detail(&self, content: &str, url: &str) -> Result<Record, ExtractError> {
        let document = Html::parse_document(content);
        let mut record = Record::new();
        record.insert("detail_url", url);

        if let Some(price) = document.select(&self.selectors.detail_price).next() {
            if let Some(value) = first_text(price, &self.selectors.price_value) {
                record.insert("detail_price_value", value);
            }
            if let Some(currency) = first_text(price, &self.selectors.price_currency) {
                record.insert("detail_price_currency", currency);
            }
        }

        self.extract_properties(&document, &mut record);

        if let Some(description) = document.select(&self.selectors.description).next() {
            record.insert("description", element_text(description));
        }

        let images: Vec<&str> = document
            .select(&self.selectors.gallery_image)
            .filter_map(|img| img.value().attr("src"))
            .filter(|src| !src.is_empty())
            .collect();
        if !images.is_empty() {
            record.insert("all_images", images.join("|"));
            record.insert("image_count", images.len().to_string());
        }

        self.extract_statistics(&document, &mut record);

        if let Some(owner) = document.select(&self.selectors.owner_name).next() {
            record.insert("owner_name", element_text(owner));
        }

        if let Some(phone) = document.select(&self.selectors.phone).next() {
            record.insert("phone", element_text(phone));
        }

        // The detail page must never override the record's key.
        if record.contains_field(URL_FIELD) {
            return Err(ExtractError::Markup(format!(
                "detail page {} produced a '{}' field",
                url, URL_FIELD
            )));
        }

        Ok(record)
    }
}

/// Concatenates an element's text nodes, each trimmed
fn element_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect::<String>()
}

fn first_text(parent: ElementRef<'_>, selector: &Selector) -> Option<String> {
    parent.select(selector).next().map(element_text)
}

/// Resolves a link href to an absolute http(s) URL
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}
