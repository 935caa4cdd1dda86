//! Listing-Harvester main entry point
//!
//! This is the command-line interface for the resumable listing harvester.

use anyhow::Context;
use clap::Parser;
use listing_harvester::config::{load_config_with_hash, validate, Config};
use listing_harvester::crawler::{run_harvest, RunReport, RunStatus};
use listing_harvester::output::{print_statistics, HarvestStatistics, OutputPaths};
use listing_harvester::storage::{CheckpointStore, JsonCheckpointStore};
use listing_harvester::ShutdownCoordinator;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Listing-Harvester: a resumable listing-site harvester
///
/// Crawls the index pages of a listing category, visits every new item's
/// detail page, and writes the merged records to CSV. Progress is
/// checkpointed so an interrupted run resumes where it stopped.
#[derive(Parser, Debug)]
#[command(name = "listing-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A resumable listing-site harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Also write log lines to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Start a fresh harvest, ignoring the checkpoint
    #[arg(long)]
    fresh: bool,

    /// First index page to crawl (overrides the config)
    #[arg(long, value_name = "PAGE")]
    start_page: Option<u32>,

    /// Last index page to crawl (overrides the config)
    #[arg(long, value_name = "PAGE")]
    end_page: Option<u32>,

    /// Only harvest index page summaries, skip detail pages
    #[arg(long)]
    no_details: bool,

    /// Validate config and show what would be harvested without harvesting
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the existing checkpoint and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let _log_guard = setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    apply_overrides(&mut config, &cli);
    validate(&config).context("Invalid command-line overrides")?;

    let paths = OutputPaths::new(
        &config.output.directory,
        &config.crawler.category_url,
        chrono::Local::now(),
    );

    if cli.dry_run {
        handle_dry_run(&config, &paths);
        Ok(())
    } else if cli.stats {
        handle_stats(&paths)
    } else {
        handle_harvest(config).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// The returned guard flushes the log file when dropped.
fn setup_logging(
    verbose: u8,
    quiet: bool,
    log_file: Option<&Path>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_harvester=info,warn"),
            1 => EnvFilter::new("listing_harvester=debug,info"),
            2 => EnvFilter::new("listing_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
            std::fs::create_dir_all(directory).context("Failed to create log directory")?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_target(false)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

/// Applies command-line overrides to the loaded configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if cli.fresh {
        config.crawler.resume = false;
    }
    if let Some(start_page) = cli.start_page {
        config.crawler.start_page = start_page;
    }
    if let Some(end_page) = cli.end_page {
        config.crawler.end_page = Some(end_page);
    }
    if cli.no_details {
        config.crawler.fetch_details = false;
    }
}

/// Handles the --dry-run mode: shows what would be harvested
fn handle_dry_run(config: &Config, paths: &OutputPaths) {
    let crawler = &config.crawler;
    println!("=== Listing-Harvester Dry Run ===\n");

    println!("Harvest Configuration:");
    println!("  Category URL: {}", crawler.category_url);
    println!("  Start page: {}", crawler.start_page);
    match crawler.end_page {
        Some(end_page) => println!("  End page: {}", end_page),
        None => println!(
            "  End page: auto-detect (fallback {})",
            crawler.fallback_last_page
        ),
    }
    println!("  Max concurrent fetches: {}", crawler.max_concurrent);
    println!("  Fetch details: {}", crawler.fetch_details);
    println!(
        "  Max retries: {} (backoff base {}ms)",
        crawler.max_retries, crawler.backoff_base
    );
    println!("  Request timeout: {}s", crawler.request_timeout);
    println!("  Checkpoint interval: {} listings", crawler.checkpoint_interval);
    println!("  Resume: {}", crawler.resume);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Checkpoint: {}", paths.checkpoint.display());
    println!("  Dataset: {}", paths.dataset.display());
    println!("  Failed URLs: {}", paths.failed_urls.display());

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the checkpoint
fn handle_stats(paths: &OutputPaths) -> anyhow::Result<()> {
    println!("Checkpoint: {}\n", paths.checkpoint.display());

    let store = JsonCheckpointStore::new(paths.checkpoint.clone());
    match store.load().context("Failed to read checkpoint")? {
        Some(checkpoint) => print_statistics(&HarvestStatistics::from_checkpoint(checkpoint)),
        None => println!("No checkpoint found"),
    }

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config) -> anyhow::Result<()> {
    if config.crawler.resume {
        tracing::info!("Starting harvest (will resume from checkpoint if present)");
    } else {
        tracing::info!("Starting fresh harvest (ignoring checkpoint)");
    }

    let shutdown = ShutdownCoordinator::new();
    let listener = shutdown.spawn_signal_listener();

    let result = run_harvest(config, shutdown).await;
    listener.abort();

    match result {
        Ok(report) => {
            print_report(&report);
            if report.status == RunStatus::Interrupted {
                tracing::warn!("Interrupted. Progress has been saved.");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}

fn print_report(report: &RunReport) {
    let rule = "=".repeat(50);
    println!("\n{}", rule);
    match report.status {
        RunStatus::Completed => println!("Harvest complete!"),
        RunStatus::Interrupted => println!("Harvest interrupted"),
    }
    println!("{}", rule);
    println!("Pages crawled up to: {}", report.last_page);
    println!("New listings found: {}", report.discovered);
    println!("Total listings: {}", report.total_records);
    println!("Processed URLs: {}", report.processed);
    println!("Checkpoint: {}", report.checkpoint_path.display());
    match (&report.dataset_path, &report.backup_path) {
        (Some(dataset), _) => println!("Output file: {}", dataset.display()),
        (None, Some(backup)) => println!("Output backup: {}", backup.display()),
        (None, None) => println!("No data was saved"),
    }
    if let Some(failed) = &report.failed_urls_path {
        println!(
            "Failed URLs: {} (saved to {})",
            report.failed,
            failed.display()
        );
    }
    println!("Elapsed: {:.1}s", report.elapsed.as_secs_f64());
    println!("{}", rule);
}
