//! Integration tests for the harvester
//!
//! These tests use wiremock to create mock listing sites and run the full
//! harvest cycle end-to-end: pagination, index crawl, detail enrichment,
//! checkpointing and output.

use listing_harvester::config::{Config, CrawlerConfig, ExtractorConfig, OutputConfig, UserAgentConfig};
use listing_harvester::crawler::{Harvester, RunStatus};
use listing_harvester::extract::{ExtractError, Extractor, HtmlExtractor};
use listing_harvester::state::Record;
use listing_harvester::storage::{Checkpoint, CheckpointStore, JsonCheckpointStore, StorageResult};
use listing_harvester::{HarvestError, ShutdownCoordinator};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration harvesting `{server}/cat` into `dir`
fn create_test_config(server: &MockServer, dir: &TempDir, end_page: Option<u32>) -> Config {
    let mut crawler = CrawlerConfig::for_category(format!("{}/cat", server.uri()));
    crawler.end_page = end_page;
    crawler.max_retries = 1;
    crawler.backoff_base = 1; // Very short for testing
    crawler.request_timeout = 5;

    Config {
        crawler,
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            directory: dir.path().display().to_string(),
        },
        extractor: ExtractorConfig::default(),
    }
}

/// Index page markup with one listing card per id
fn index_page(ids: impl IntoIterator<Item = u32>) -> String {
    let cards: String = ids
        .into_iter()
        .map(|id| {
            format!(
                r#"<div class="products-i">
                    <a class="products-link" href="/item/{id}.html">
                        <div class="products-name">Listing {id}</div>
                        <div class="products-price">
                            <span class="price-val">{id}000</span><span class="price-cur">AZN</span>
                        </div>
                    </a>
                    <a class="add_bookmark" data-id="{id}"></a>
                </div>"#,
                id = id
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", cards)
}

/// Detail page markup carrying a room count
fn detail_page(rooms: u32) -> String {
    format!(
        r#"<html><body>
        <div class="product-properties__i">
            <label class="product-properties__i-name">Otaq sayı:</label>
            <span class="product-properties__i-value">{}</span>
        </div>
        </body></html>"#,
        rooms
    )
}

async fn mount_index(server: &MockServer, page: u32, body: String) {
    let route = if page == 1 {
        "/cat".to_string()
    } else {
        format!("/cat/page/{}/", page)
    };
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn item_url(server: &MockServer, id: u32) -> String {
    format!("{}/item/{}.html", server.uri(), id)
}

fn read_checkpoint(harvester: &Harvester) -> Checkpoint {
    JsonCheckpointStore::new(harvester.paths().checkpoint.clone())
        .load()
        .expect("Failed to read checkpoint")
        .expect("No checkpoint written")
}

/// Reads the dataset, dropping the byte-order mark
fn read_dataset(harvester: &Harvester) -> Vec<String> {
    let content =
        std::fs::read_to_string(&harvester.paths().dataset).expect("Failed to read dataset");
    content
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_harvest_stops_at_first_empty_page() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_index(&mock_server, 1, index_page([1, 2])).await;
    mount_index(&mock_server, 2, index_page(Vec::<u32>::new())).await;
    mount_index(&mock_server, 3, index_page(10..15)).await;

    for id in [1, 2] {
        Mock::given(method("GET"))
            .and(path(format!("/item/{}.html", id)))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(id + 1)))
            .expect(1)
            .mount(&mock_server)
            .await;
    }
    // Items beyond the empty page are never enriched
    Mock::given(method("GET"))
        .and(path_regex(r"^/item/1[0-4]\.html$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(9)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server, &dir, Some(3));
    let mut harvester = Harvester::new(config, ShutdownCoordinator::new()).unwrap();
    let report = harvester.run().await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.total_records, 2);
    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 0);

    let state = harvester.state();
    assert!(state.is_processed(&item_url(&mock_server, 1)));
    assert!(state.is_processed(&item_url(&mock_server, 2)));
    assert_eq!(state.records()[0].get("rooms"), Some("2"));
    assert_eq!(state.records()[0].get("title"), Some("Listing 1"));

    let rows = read_dataset(&harvester);
    assert_eq!(rows.len(), 3);
    assert!(rows[0].starts_with("listing_id,title,price,price_value,price_currency,rooms"));
    assert!(report.failed_urls_path.is_none());
}

#[tokio::test]
async fn test_resume_skips_processed_urls() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_index(&mock_server, 1, index_page([1])).await;
    Mock::given(method("GET"))
        .and(path("/item/1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(5)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server, &dir, Some(1));
    let mut harvester = Harvester::new(config.clone(), ShutdownCoordinator::new()).unwrap();

    let mut previous = Record::with_url(item_url(&mock_server, 1));
    previous.insert("title", "X");
    JsonCheckpointStore::new(harvester.paths().checkpoint.clone())
        .save(&Checkpoint {
            processed_urls: vec![item_url(&mock_server, 1)],
            listings: vec![previous.clone()],
            failed_urls: vec![],
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
            category_url: config.crawler.category_url.clone(),
        })
        .unwrap();

    let report = harvester.run().await.unwrap();

    assert_eq!(report.discovered, 0);
    assert_eq!(report.total_records, 1);
    assert_eq!(harvester.state().records(), &[previous]);
}

#[tokio::test]
async fn test_failed_detail_is_kept_and_retried_on_resume() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_index(&mock_server, 1, index_page([1, 2])).await;
    Mock::given(method("GET"))
        .and(path("/item/1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(1)))
        .expect(1)
        .mount(&mock_server)
        .await;
    // First run: initial attempt + one retry both fail
    Mock::given(method("GET"))
        .and(path("/item/2.html"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/item/2.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(4)))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server, &dir, Some(1));
    let failed_url = item_url(&mock_server, 2);

    let mut first = Harvester::new(config.clone(), ShutdownCoordinator::new()).unwrap();
    let report = first.run().await.unwrap();

    assert_eq!(report.total_records, 2);
    assert_eq!(report.processed, 1);
    assert_eq!(first.state().failed_urls(), &[failed_url.clone()]);
    assert!(!first.state().is_processed(&failed_url));
    assert!(first.state().has_record(&failed_url));

    let failed_file = report.failed_urls_path.expect("No failed-URL file written");
    assert_eq!(
        std::fs::read_to_string(failed_file).unwrap(),
        format!("{}\n", failed_url)
    );

    let checkpoint = read_checkpoint(&first);
    assert_eq!(checkpoint.processed_urls, vec![item_url(&mock_server, 1)]);
    assert_eq!(checkpoint.listings.len(), 2);

    // Second run enriches the partial record in place
    let mut second = Harvester::new(config, ShutdownCoordinator::new()).unwrap();
    let report = second.run().await.unwrap();

    assert_eq!(report.discovered, 1);
    assert_eq!(report.total_records, 2);
    assert_eq!(report.processed, 2);

    let state = second.state();
    assert!(state.is_consistent());
    assert!(state.is_processed(&failed_url));
    assert_eq!(state.records()[1].get("rooms"), Some("4"));
    // Still listed as needing a manual check
    assert_eq!(state.failed_urls(), &[failed_url]);
}

/// Delegates to the HTML extractor and requests shutdown shortly after a
/// given detail page has been extracted
struct ShutdownAfterDetail {
    inner: HtmlExtractor,
    shutdown: ShutdownCoordinator,
    trigger_at: usize,
    delay: Duration,
    details_seen: AtomicUsize,
}

impl Extractor for ShutdownAfterDetail {
    fn parse_page(&self, content: &str) -> Result<Vec<Record>, ExtractError> {
        self.inner.parse_page(content)
    }

    fn parse_detail(&self, content: &str, url: &str) -> Result<Record, ExtractError> {
        let seen = self.details_seen.fetch_add(1, Ordering::SeqCst) + 1;
        if seen == self.trigger_at {
            let shutdown = self.shutdown.clone();
            let delay = self.delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                shutdown.request_shutdown();
            });
        }
        self.inner.parse_detail(content, url)
    }
}

#[tokio::test]
async fn test_shutdown_during_detail_fetch_saves_progress() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_index(&mock_server, 1, index_page(1..=100)).await;
    for id in 1..=100u32 {
        let (template, expected) = match id {
            // Still on the wire when shutdown is requested
            37 => (
                ResponseTemplate::new(200)
                    .set_body_string(detail_page(2))
                    .set_delay(Duration::from_secs(1)),
                1,
            ),
            id if id < 37 => (ResponseTemplate::new(200).set_body_string(detail_page(2)), 1),
            _ => (ResponseTemplate::new(200).set_body_string(detail_page(2)), 0),
        };
        Mock::given(method("GET"))
            .and(path(format!("/item/{}.html", id)))
            .respond_with(template)
            .expect(expected)
            .mount(&mock_server)
            .await;
    }

    let mut config = create_test_config(&mock_server, &dir, Some(1));
    config.crawler.checkpoint_interval = 50;

    let shutdown = ShutdownCoordinator::new();
    let extractor = ShutdownAfterDetail {
        inner: HtmlExtractor::new(&config.extractor, &config.crawler.category_url).unwrap(),
        shutdown: shutdown.clone(),
        trigger_at: 36,
        delay: Duration::from_millis(200),
        details_seen: AtomicUsize::new(0),
    };
    let mut harvester =
        Harvester::with_extractor(config, shutdown.clone(), Box::new(extractor)).unwrap();

    let report = tokio::time::timeout(Duration::from_secs(30), harvester.run())
        .await
        .expect("Harvest did not stop after shutdown")
        .unwrap();

    assert_eq!(report.status, RunStatus::Interrupted);
    assert_eq!(report.discovered, 100);
    assert_eq!(report.processed, 36);
    assert_eq!(report.total_records, 36);

    let checkpoint = read_checkpoint(&harvester);
    assert_eq!(checkpoint.processed_urls.len(), 36);
    assert!(checkpoint
        .processed_urls
        .contains(&item_url(&mock_server, 36)));
    assert!(!checkpoint
        .processed_urls
        .contains(&item_url(&mock_server, 37)));
    assert!(checkpoint
        .listings
        .iter()
        .all(|record| record.url() != Some(item_url(&mock_server, 37).as_str())));

    // Header plus 36 rows
    assert_eq!(read_dataset(&harvester).len(), 37);
}

#[tokio::test]
async fn test_auto_detected_pagination() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let first_page = format!(
        r#"{}<div class="navigation">
            <a href="/cat/page/2/">2</a>
            <a href="/cat/page/3/">3</a>
        </div>"#,
        index_page([1, 2])
    );
    // Fetched once for detection and once by the index crawl
    Mock::given(method("GET"))
        .and(path("/cat"))
        .respond_with(ResponseTemplate::new(200).set_body_string(first_page))
        .expect(2)
        .mount(&mock_server)
        .await;
    mount_index(&mock_server, 2, index_page([3, 4])).await;
    mount_index(&mock_server, 3, index_page([5])).await;
    Mock::given(method("GET"))
        .and(path("/cat/page/4/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(index_page([9])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server, &dir, None);
    config.crawler.fetch_details = false;

    let mut harvester = Harvester::new(config, ShutdownCoordinator::new()).unwrap();
    let report = harvester.run().await.unwrap();

    assert_eq!(report.last_page, 3);
    assert_eq!(report.total_records, 5);
    // Without detail pages, summaries are final
    assert_eq!(report.processed, 5);
}

#[tokio::test]
async fn test_failed_index_page_is_recorded() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_index(&mock_server, 1, index_page([1])).await;
    Mock::given(method("GET"))
        .and(path("/cat/page/2/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&mock_server)
        .await;
    mount_index(&mock_server, 3, index_page([3])).await;

    let mut config = create_test_config(&mock_server, &dir, Some(3));
    config.crawler.fetch_details = false;

    let mut harvester = Harvester::new(config, ShutdownCoordinator::new()).unwrap();
    let report = harvester.run().await.unwrap();

    assert_eq!(report.total_records, 2);
    assert_eq!(
        harvester.state().failed_urls(),
        &[format!("{}/cat/page/2/", mock_server.uri())]
    );
}

#[tokio::test]
async fn test_fresh_run_ignores_checkpoint() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_index(&mock_server, 1, index_page([1])).await;

    let mut config = create_test_config(&mock_server, &dir, Some(1));
    config.crawler.fetch_details = false;
    config.crawler.resume = false;

    let mut harvester = Harvester::new(config.clone(), ShutdownCoordinator::new()).unwrap();
    JsonCheckpointStore::new(harvester.paths().checkpoint.clone())
        .save(&Checkpoint {
            processed_urls: vec!["https://elsewhere/1".to_string()],
            listings: vec![Record::with_url("https://elsewhere/1")],
            failed_urls: vec![],
            timestamp: String::new(),
            category_url: config.crawler.category_url.clone(),
        })
        .unwrap();

    let report = harvester.run().await.unwrap();
    assert_eq!(report.total_records, 1);
    assert!(harvester.state().is_processed(&item_url(&mock_server, 1)));
    assert!(!harvester.state().has_record("https://elsewhere/1"));
}

#[tokio::test]
async fn test_checkpoint_for_other_category_is_ignored() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_index(&mock_server, 1, index_page([1])).await;

    let mut config = create_test_config(&mock_server, &dir, Some(1));
    config.crawler.fetch_details = false;

    let mut harvester = Harvester::new(config, ShutdownCoordinator::new()).unwrap();
    JsonCheckpointStore::new(harvester.paths().checkpoint.clone())
        .save(&Checkpoint {
            processed_urls: vec![],
            listings: vec![Record::with_url("https://elsewhere/1")],
            failed_urls: vec![],
            timestamp: String::new(),
            category_url: "https://example.com/other".to_string(),
        })
        .unwrap();

    let report = harvester.run().await.unwrap();
    assert_eq!(report.total_records, 1);
    assert!(!harvester.state().has_record("https://elsewhere/1"));
}

#[tokio::test]
async fn test_unreachable_first_page_is_recorded_as_failed() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Detection and the index crawl each make two attempts
    Mock::given(method("GET"))
        .and(path("/cat"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&mock_server)
        .await;
    mount_index(&mock_server, 2, index_page(Vec::<u32>::new())).await;

    let mut config = create_test_config(&mock_server, &dir, None);
    config.crawler.fallback_last_page = 2;
    config.crawler.fetch_details = false;

    let mut harvester = Harvester::new(config, ShutdownCoordinator::new()).unwrap();
    let report = harvester.run().await.unwrap();

    assert_eq!(report.last_page, 2);
    assert_eq!(report.total_records, 0);
    assert_eq!(
        harvester.state().failed_urls(),
        &[format!("{}/cat", mock_server.uri())]
    );
}

/// Checkpoint store that serves a fixed snapshot and records every save
struct RecordingStore {
    initial: Checkpoint,
    saved: Arc<Mutex<Vec<Checkpoint>>>,
}

impl CheckpointStore for RecordingStore {
    fn load(&self) -> StorageResult<Option<Checkpoint>> {
        Ok(Some(self.initial.clone()))
    }

    fn save(&self, checkpoint: &Checkpoint) -> StorageResult<()> {
        self.saved.lock().unwrap().push(checkpoint.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_critical_error_saves_checkpoint_before_failing() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // The output directory cannot be created below a regular file
    let blocker = dir.path().join("not-a-directory");
    std::fs::write(&blocker, "x").unwrap();

    let mut config = create_test_config(&mock_server, &dir, Some(1));
    config.output.directory = blocker.join("out").display().to_string();

    let mut previous = Record::with_url(item_url(&mock_server, 1));
    previous.insert("title", "Saved earlier");
    let saved = Arc::new(Mutex::new(Vec::new()));
    let store = RecordingStore {
        initial: Checkpoint {
            processed_urls: vec![item_url(&mock_server, 1)],
            listings: vec![previous.clone()],
            failed_urls: vec![],
            timestamp: String::new(),
            category_url: config.crawler.category_url.clone(),
        },
        saved: saved.clone(),
    };

    let mut harvester = Harvester::new(config, ShutdownCoordinator::new())
        .unwrap()
        .with_checkpoint_store(Box::new(store));
    let result = harvester.run().await;

    assert!(matches!(result, Err(HarvestError::Io(_))));
    let saved = saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].processed_urls, vec![item_url(&mock_server, 1)]);
    assert_eq!(saved[0].listings, vec![previous]);
}
