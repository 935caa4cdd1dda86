//! Listing record type
//!
//! A record is an open field → value mapping for one listing. The `url`
//! field is its natural key.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field holding a record's source URL
pub const URL_FIELD: &str = "url";

/// One harvested listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    /// Creates an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record carrying only its source URL
    pub fn with_url(url: impl Into<String>) -> Self {
        let mut record = Self::new();
        record.insert(URL_FIELD, url);
        record
    }

    /// Returns the record's source URL, if it has a non-empty one
    pub fn url(&self) -> Option<&str> {
        self.get(URL_FIELD).filter(|url| !url.is_empty())
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Sets a field, returning the previous value
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(field.into(), value.into())
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Iterates over field names in lexicographic order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges detail fields onto this record
    ///
    /// Detail values replace existing values on key collision; fields the
    /// detail does not carry are kept.
    pub fn merge(&mut self, detail: Record) {
        self.0.extend(detail.0);
    }

    /// Consuming variant of [`Record::merge`]
    pub fn merged_with(mut self, detail: Record) -> Self {
        self.merge(detail);
        self
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// Checkpoints written by other tools may carry numbers or nulls as values.
impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
        Ok(Self(
            raw.into_iter()
                .map(|(field, value)| (field, value_to_string(value)))
                .collect(),
        ))
    }
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_url() {
        let record = Record::with_url("https://example.com/item/1");
        assert_eq!(record.url(), Some("https://example.com/item/1"));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_empty_url_is_absent() {
        let record: Record = [("url", ""), ("title", "X")].into_iter().collect();
        assert_eq!(record.url(), None);
    }

    #[test]
    fn test_merge_detail_wins_and_summary_fields_kept() {
        let summary: Record = [("url", "u"), ("title", "Card title"), ("price", "100 AZN")]
            .into_iter()
            .collect();
        let detail: Record = [("title", "Full title"), ("rooms", "3")].into_iter().collect();

        let merged = summary.merged_with(detail);

        assert_eq!(merged.get("title"), Some("Full title"));
        assert_eq!(merged.get("price"), Some("100 AZN"));
        assert_eq!(merged.get("rooms"), Some("3"));
        assert_eq!(merged.url(), Some("u"));
    }

    #[test]
    fn test_deserialize_stringifies_scalars() {
        let json = r#"{"url": "a", "image_count": 4, "featured": true, "phone": null}"#;
        let record: Record = serde_json::from_str(json).unwrap();

        assert_eq!(record.get("image_count"), Some("4"));
        assert_eq!(record.get("featured"), Some("true"));
        assert_eq!(record.get("phone"), Some(""));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let record: Record = [("url", "a"), ("title", "X")].into_iter().collect();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"title":"X","url":"a"}"#);
    }
}
