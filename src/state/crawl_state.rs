//! Mutable run state: ledger, accumulated records, failed URLs
//!
//! The ledger (processed URLs) and the accumulation set are only changed
//! together, through [`CrawlState::commit`], so that every processed URL
//! always has exactly one record.

use crate::state::Record;
use std::collections::{HashMap, HashSet};

/// State of one harvest run
#[derive(Debug, Clone, Default)]
pub struct CrawlState {
    /// URLs whose records are final (the dedup ledger)
    processed: HashSet<String>,

    /// Accumulated records, in discovery order
    records: Vec<Record>,

    /// Position of each record by URL
    positions: HashMap<String, usize>,

    /// URLs that exhausted their retries, in first-failure order
    failed: Vec<String>,
    failed_seen: HashSet<String>,
}

/// What happened when a record was applied to the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A new record was appended
    Appended,
    /// An existing record with the same URL was replaced
    Replaced,
    /// Nothing changed (record without URL, or a partial record for a known URL)
    Ignored,
}

impl CrawlState {
    /// Creates an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds state from previously persisted parts
    ///
    /// Records without a URL and repeated URLs are dropped, as are processed
    /// URLs that have no record, so the restored state satisfies the same
    /// invariants as a freshly built one.
    pub fn restore(
        processed_urls: impl IntoIterator<Item = String>,
        records: impl IntoIterator<Item = Record>,
        failed_urls: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut state = Self::new();

        for record in records {
            match record.url() {
                Some(url) if !state.positions.contains_key(url) => {
                    state.positions.insert(url.to_string(), state.records.len());
                    state.records.push(record);
                }
                Some(url) => {
                    tracing::warn!("Dropping duplicate record for {} from checkpoint", url);
                }
                None => {
                    tracing::warn!("Dropping record without url from checkpoint");
                }
            }
        }

        for url in processed_urls {
            if state.positions.contains_key(&url) {
                state.processed.insert(url);
            } else {
                tracing::warn!(
                    "Processed URL {} has no record in checkpoint, will be fetched again",
                    url
                );
            }
        }

        for url in failed_urls {
            state.record_failure(url);
        }

        state
    }

    /// Returns true if the URL's record is final
    pub fn is_processed(&self, url: &str) -> bool {
        self.processed.contains(url)
    }

    /// Returns true if any record (final or partial) exists for the URL
    pub fn has_record(&self, url: &str) -> bool {
        self.positions.contains_key(url)
    }

    /// Stores a final record and marks its URL processed
    ///
    /// A partial record previously kept for the same URL is replaced in place.
    pub fn commit(&mut self, record: Record) -> Applied {
        let Some(url) = record.url().map(str::to_string) else {
            tracing::warn!("Ignoring record without url");
            return Applied::Ignored;
        };

        let applied = match self.positions.get(&url) {
            Some(&position) => {
                self.records[position] = record;
                Applied::Replaced
            }
            None => {
                self.positions.insert(url.clone(), self.records.len());
                self.records.push(record);
                Applied::Appended
            }
        };
        self.processed.insert(url);
        applied
    }

    /// Keeps an unenriched record without marking its URL processed
    ///
    /// A URL that already has a record keeps the existing one.
    pub fn keep_partial(&mut self, record: Record) -> Applied {
        let Some(url) = record.url().map(str::to_string) else {
            tracing::warn!("Ignoring partial record without url");
            return Applied::Ignored;
        };

        if self.positions.contains_key(&url) {
            return Applied::Ignored;
        }

        self.positions.insert(url, self.records.len());
        self.records.push(record);
        Applied::Appended
    }

    /// Records a URL that exhausted its retries; returns false if already recorded
    pub fn record_failure(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if !self.failed_seen.insert(url.clone()) {
            return false;
        }
        self.failed.push(url);
        true
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn failed_urls(&self) -> &[String] {
        &self.failed
    }

    /// Processed URLs in lexicographic order
    pub fn processed_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.processed.iter().cloned().collect();
        urls.sort();
        urls
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Checks the ledger invariants: unique record URLs, ledger ⊆ record URLs
    pub fn is_consistent(&self) -> bool {
        let mut seen = HashSet::new();
        let urls_unique = self
            .records
            .iter()
            .all(|record| record.url().map(|url| seen.insert(url)).unwrap_or(false));

        urls_unique && self.processed.iter().all(|url| seen.contains(url.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, title: &str) -> Record {
        [("url", url), ("title", title)].into_iter().collect()
    }

    #[test]
    fn test_commit_marks_processed() {
        let mut state = CrawlState::new();
        assert_eq!(state.commit(record("a", "X")), Applied::Appended);

        assert!(state.is_processed("a"));
        assert_eq!(state.record_count(), 1);
        assert!(state.is_consistent());
    }

    #[test]
    fn test_partial_is_not_processed() {
        let mut state = CrawlState::new();
        assert_eq!(state.keep_partial(record("a", "X")), Applied::Appended);

        assert!(!state.is_processed("a"));
        assert!(state.has_record("a"));
        assert!(state.is_consistent());
    }

    #[test]
    fn test_commit_replaces_partial_in_place() {
        let mut state = CrawlState::new();
        state.keep_partial(record("a", "partial"));
        state.commit(record("b", "B"));

        assert_eq!(state.commit(record("a", "full")), Applied::Replaced);

        assert_eq!(state.record_count(), 2);
        assert_eq!(state.records()[0].get("title"), Some("full"));
        assert!(state.is_processed("a"));
        assert!(state.is_consistent());
    }

    #[test]
    fn test_partial_for_known_url_is_ignored() {
        let mut state = CrawlState::new();
        state.commit(record("a", "full"));

        assert_eq!(state.keep_partial(record("a", "partial")), Applied::Ignored);
        assert_eq!(state.records()[0].get("title"), Some("full"));
    }

    #[test]
    fn test_record_without_url_is_ignored() {
        let mut state = CrawlState::new();
        let no_url: Record = [("title", "X")].into_iter().collect();

        assert_eq!(state.commit(no_url.clone()), Applied::Ignored);
        assert_eq!(state.keep_partial(no_url), Applied::Ignored);
        assert_eq!(state.record_count(), 0);
    }

    #[test]
    fn test_failures_recorded_once_in_order() {
        let mut state = CrawlState::new();
        assert!(state.record_failure("b"));
        assert!(state.record_failure("a"));
        assert!(!state.record_failure("b"));

        assert_eq!(state.failed_urls(), &["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_restore_repairs_invariants() {
        let state = CrawlState::restore(
            vec!["a".to_string(), "ghost".to_string()],
            vec![record("a", "X"), record("a", "dup"), Record::new()],
            vec!["f".to_string(), "f".to_string()],
        );

        assert!(state.is_processed("a"));
        assert!(!state.is_processed("ghost"));
        assert_eq!(state.record_count(), 1);
        assert_eq!(state.records()[0].get("title"), Some("X"));
        assert_eq!(state.failed_urls().len(), 1);
        assert!(state.is_consistent());
    }

    #[test]
    fn test_processed_urls_sorted() {
        let mut state = CrawlState::new();
        state.commit(record("c", ""));
        state.commit(record("a", ""));
        state.commit(record("b", ""));

        assert_eq!(state.processed_urls(), vec!["a", "b", "c"]);
    }
}
