//! Harvest coordinator - main run orchestration logic
//!
//! This module contains the controller that owns a run's state and drives
//! every other component:
//! - Restoring state from the checkpoint
//! - Resolving the page range (fixed or auto-detected)
//! - Crawling the index pages
//! - Enriching new items one at a time
//! - Periodic and final persistence, including after shutdown or a
//!   critical error
//!
//! All state changes happen here, between awaits, never inside the
//! concurrent fetch dispatch.

use crate::config::Config;
use crate::crawler::enricher::{DetailEnricher, Enrichment};
use crate::crawler::fetcher::{build_http_client, Fetcher, RetryPolicy};
use crate::crawler::gate::ConcurrencyGate;
use crate::crawler::index::IndexCrawler;
use crate::crawler::pagination::{CrawlRange, EndPage, PaginationDiscoverer};
use crate::extract::{Extractor, HtmlExtractor};
use crate::output::{OutputError, OutputPaths, OutputWriter};
use crate::shutdown::ShutdownCoordinator;
use crate::state::CrawlState;
use crate::storage::{Checkpoint, CheckpointStore, JsonCheckpointStore};
use crate::HarvestError;
use chrono::Local;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every discovered item was handled
    Completed,
    /// Shutdown was requested before the run finished
    Interrupted,
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,

    /// Last index page of the range that was crawled
    pub last_page: u32,

    /// New items found on the index pages
    pub discovered: usize,

    /// Enrichment results applied during this run
    pub applied: usize,

    /// Records in the accumulation set
    pub total_records: usize,

    /// URLs whose records are final
    pub processed: usize,

    /// URLs that exhausted their retries
    pub failed: usize,

    pub checkpoint_path: PathBuf,

    /// Dataset file, if records were written
    pub dataset_path: Option<PathBuf>,

    /// JSON dump written because the dataset could not be
    pub backup_path: Option<PathBuf>,

    /// Failed-URL file, if any URL failed
    pub failed_urls_path: Option<PathBuf>,

    pub elapsed: Duration,
}

/// Progress made by the crawl phase of a run
#[derive(Debug, Default)]
struct CrawlProgress {
    last_page: u32,
    discovered: usize,
    applied: usize,
}

/// Main harvest controller
pub struct Harvester {
    config: Config,
    fetcher: Fetcher,
    extractor: Box<dyn Extractor>,
    pagination: PaginationDiscoverer,
    store: Box<dyn CheckpointStore>,
    writer: OutputWriter,
    shutdown: ShutdownCoordinator,
    paths: OutputPaths,
    state: CrawlState,
}

impl Harvester {
    /// Creates a harvester using the bundled HTML extractor
    ///
    /// # Arguments
    ///
    /// * `config` - The validated harvester configuration
    /// * `shutdown` - Coordinator whose token cancels the run
    pub fn new(config: Config, shutdown: ShutdownCoordinator) -> Result<Self, HarvestError> {
        let extractor = HtmlExtractor::new(&config.extractor, &config.crawler.category_url)?;
        Self::with_extractor(config, shutdown, Box::new(extractor))
    }

    /// Creates a harvester with a custom extractor
    pub fn with_extractor(
        config: Config,
        shutdown: ShutdownCoordinator,
        extractor: Box<dyn Extractor>,
    ) -> Result<Self, HarvestError> {
        let paths = OutputPaths::new(
            &config.output.directory,
            &config.crawler.category_url,
            Local::now(),
        );

        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.crawler.request_timeout),
        )?;
        let fetcher = Fetcher::new(
            client,
            ConcurrencyGate::new(config.crawler.max_concurrent as usize),
            RetryPolicy::from_config(&config.crawler),
            shutdown.token(),
        );
        let pagination = PaginationDiscoverer::new(
            &config.extractor.pagination,
            config.crawler.fallback_last_page,
        )?;

        Ok(Self {
            store: Box::new(JsonCheckpointStore::new(paths.checkpoint.clone())),
            writer: OutputWriter::new(&paths),
            config,
            fetcher,
            extractor,
            pagination,
            shutdown,
            paths,
            state: CrawlState::new(),
        })
    }

    /// Replaces the checkpoint store
    ///
    /// The default store is a JSON file at [`OutputPaths::checkpoint`].
    pub fn with_checkpoint_store(mut self, store: Box<dyn CheckpointStore>) -> Self {
        self.store = store;
        self
    }

    pub fn paths(&self) -> &OutputPaths {
        &self.paths
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    /// Runs the harvest to completion or until shutdown
    ///
    /// A checkpoint and the dataset are written before this returns, whether
    /// the run completed, was interrupted, or hit a critical error.
    pub async fn run(&mut self) -> Result<RunReport, HarvestError> {
        let start_time = Instant::now();
        tracing::info!("Category: {}", self.config.crawler.category_url);
        tracing::info!("Fetch details: {}", self.config.crawler.fetch_details);

        self.restore_checkpoint();

        let progress = match self.crawl().await {
            Ok(progress) => progress,
            Err(e) => {
                tracing::error!("Critical error during harvest: {}", e);
                self.save_checkpoint();
                self.save_progress();
                return Err(e);
            }
        };

        let status = if self.shutdown.is_shutting_down() {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };

        self.save_checkpoint();
        let (dataset_path, backup_path) = match self.writer.flush(self.state.records()) {
            Ok(path) => (path, None),
            Err(OutputError::Dataset { backup, .. }) => (None, backup),
            Err(e) => {
                tracing::error!("Error saving dataset: {}", e);
                (None, None)
            }
        };
        let failed_urls_path = match self.writer.write_failed_urls(self.state.failed_urls()) {
            Ok(path) => path,
            Err(e) => {
                tracing::error!("Error saving failed URLs: {}", e);
                None
            }
        };

        tracing::info!(
            "Harvest {}: {} listings, {} processed, {} failed in {:?}",
            match status {
                RunStatus::Completed => "completed",
                RunStatus::Interrupted => "interrupted",
            },
            self.state.record_count(),
            self.state.processed_count(),
            self.state.failed_urls().len(),
            start_time.elapsed()
        );

        Ok(RunReport {
            status,
            last_page: progress.last_page,
            discovered: progress.discovered,
            applied: progress.applied,
            total_records: self.state.record_count(),
            processed: self.state.processed_count(),
            failed: self.state.failed_urls().len(),
            checkpoint_path: self.paths.checkpoint.clone(),
            dataset_path,
            backup_path,
            failed_urls_path,
            elapsed: start_time.elapsed(),
        })
    }

    /// Loads the previous checkpoint into the run state, if resuming
    fn restore_checkpoint(&mut self) {
        if !self.config.crawler.resume {
            tracing::info!("Resume disabled, starting fresh");
            return;
        }

        let category_url = &self.config.crawler.category_url;
        match self.store.load() {
            Ok(Some(checkpoint)) => {
                if !checkpoint.category_url.is_empty()
                    && !same_category(&checkpoint.category_url, category_url)
                {
                    tracing::warn!(
                        "Ignoring checkpoint for a different category ({})",
                        checkpoint.category_url
                    );
                    return;
                }
                self.state = checkpoint.into_state();
                tracing::info!(
                    "Resumed from checkpoint: {} listings, {} URLs processed",
                    self.state.record_count(),
                    self.state.processed_count()
                );
            }
            Ok(None) => {
                tracing::info!("No checkpoint found, starting fresh");
            }
            Err(e) => {
                tracing::error!("Error loading checkpoint, starting fresh: {}", e);
            }
        }
    }

    /// Crawls the index and enriches every new item
    async fn crawl(&mut self) -> Result<CrawlProgress, HarvestError> {
        std::fs::create_dir_all(&self.config.output.directory)?;

        let crawler_config = &self.config.crawler;
        let category_url = crawler_config.category_url.as_str();
        let range = CrawlRange::new(crawler_config.start_page, crawler_config.end_page);

        let last_page = match range.end {
            EndPage::Fixed(page) => page,
            EndPage::Auto => {
                let detection = self
                    .pagination
                    .detect_last_page(&self.fetcher, category_url)
                    .await;
                if let Some(url) = detection.failed_url {
                    self.state.record_failure(url);
                }
                tracing::info!("Auto-detected end page: {}", detection.last_page.page());
                detection.last_page.page()
            }
        };
        let mut progress = CrawlProgress {
            last_page,
            ..CrawlProgress::default()
        };

        if self.shutdown.is_shutting_down() {
            return Ok(progress);
        }

        tracing::info!("Starting harvest from page {} to {}", range.start, last_page);
        let index = IndexCrawler::new(
            &self.fetcher,
            self.extractor.as_ref(),
            category_url,
            crawler_config.index_wave_size as usize,
        );
        let outcome = index.crawl(range.start, last_page, &self.state).await;

        for url in outcome.failed_pages {
            self.state.record_failure(url);
        }
        progress.discovered = outcome.summaries.len();
        tracing::info!("Found {} new listings to process", progress.discovered);

        if outcome.cancelled || self.shutdown.is_shutting_down() {
            return Ok(progress);
        }

        if !crawler_config.fetch_details {
            for summary in outcome.summaries {
                self.state.commit(summary);
                progress.applied += 1;
            }
            return Ok(progress);
        }

        tracing::info!("Fetching detailed information for each listing...");
        let checkpoint_interval = crawler_config.checkpoint_interval.max(1) as usize;
        let enricher = DetailEnricher::new(&self.fetcher, self.extractor.as_ref());
        let total = progress.discovered;

        for (i, summary) in outcome.summaries.into_iter().enumerate() {
            if self.shutdown.is_shutting_down() {
                tracing::info!("Stopping before listing {}/{}", i + 1, total);
                break;
            }

            let enrichment = enricher.enrich(summary).await;
            // The item in flight at shutdown stays unprocessed.
            if self.shutdown.is_shutting_down() {
                tracing::info!("Stopping at listing {}/{}", i + 1, total);
                break;
            }

            match enrichment {
                Enrichment::Merged(record) | Enrichment::Unextracted(record) => {
                    self.state.commit(record);
                }
                Enrichment::Failed { partial, url } => {
                    self.state.record_failure(url);
                    self.state.keep_partial(partial);
                }
                Enrichment::Cancelled => {
                    tracing::info!("Stopping before listing {}/{}", i + 1, total);
                    break;
                }
            }
            progress.applied += 1;

            if progress.applied % checkpoint_interval == 0 {
                self.save_checkpoint();
                self.save_progress();
                tracing::info!(
                    "Auto-saved progress: {} listings",
                    self.state.record_count()
                );
            }
            if (i + 1) % 10 == 0 {
                tracing::info!("Processed {}/{} listings", i + 1, total);
            }
        }

        Ok(progress)
    }

    /// Writes the checkpoint; a failure is logged and retried at the next save
    fn save_checkpoint(&self) {
        let checkpoint = Checkpoint::capture(&self.state, &self.config.crawler.category_url);
        if let Err(e) = self.store.save(&checkpoint) {
            tracing::error!("Error saving checkpoint: {}", e);
        }
    }

    /// Writes the dataset and failed-URL files
    fn save_progress(&self) {
        if let Err(e) = self.writer.flush(self.state.records()) {
            tracing::error!("Error saving dataset: {}", e);
        }
        if let Err(e) = self.writer.write_failed_urls(self.state.failed_urls()) {
            tracing::error!("Error saving failed URLs: {}", e);
        }
    }
}

fn same_category(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

/// Runs a complete harvest
///
/// # Example
///
/// ```no_run
/// use listing_harvester::config::load_config;
/// use listing_harvester::crawler::run_harvest;
/// use listing_harvester::ShutdownCoordinator;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let report = run_harvest(config, ShutdownCoordinator::new()).await?;
/// println!("{} listings", report.total_records);
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(
    config: Config,
    shutdown: ShutdownCoordinator,
) -> Result<RunReport, HarvestError> {
    let mut harvester = Harvester::new(config, shutdown)?;
    harvester.run().await
}
