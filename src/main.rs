//! Pagefeed main entry point
//!
//! This is the command-line interface for the Pagefeed crawler.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pagefeed::blocker::BlockKind;
use pagefeed::config::{load_config_with_hash, resolve_threads, Config};
use pagefeed::orchestrator::DirCounts;
use pagefeed::output::{load_statistics, print_patterns, print_statistics};
use pagefeed::{AddOutcome, CrawlerEvent, NullTrainer, Orchestrator, StatusSnapshot, UrlScheduler};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How often `run` checks whether the crawl has finished
const FINISH_POLL: Duration = Duration::from_secs(1);

/// Pagefeed: a polite continuous crawler
///
/// Pagefeed keeps a persistent URL store, fetches one page at a time under a
/// rate limit, and feeds the pages through preprocess, tokenize and train
/// stages.
#[derive(Parser, Debug)]
#[command(name = "pagefeed")]
#[command(version = "1.0.0")]
#[command(about = "A polite continuous crawler feeding a text pipeline", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl until Ctrl-C or until max-pages is reached
    Run,

    /// Offer URLs to the crawl
    Add {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Add a block pattern
    Block {
        pattern: String,

        /// Matching strategy: exact, domain, prefix or regex
        #[arg(long, default_value = "exact")]
        kind: BlockKind,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Remove exact block patterns for a URL and return it to pending
    Unblock { url: String },

    /// Remove a block pattern by id
    UnblockPattern { id: u64 },

    /// List block patterns
    Patterns,

    /// Show statistics from the URL store
    Stats,

    /// Write every stored URL to a file, one per line
    Export { path: PathBuf },

    /// Offer every URL in a file to the crawl
    Import { path: PathBuf },

    /// Return every non-blocked URL to pending
    Reset,

    /// Recompute the priority of every pending URL
    Recalc,

    /// Validate the configuration and show what would be crawled
    DryRun,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Run => handle_run(config),
        Command::DryRun => handle_dry_run(&config),
        command => handle_store_command(&config, command),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagefeed=info,warn"),
            1 => EnvFilter::new("pagefeed=debug,info"),
            2 => EnvFilter::new("pagefeed=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .with_file(false)
        .init();
}

fn open_scheduler(config: &Config) -> anyhow::Result<UrlScheduler> {
    let data_dir = &config.crawler.data_dir;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
    UrlScheduler::open(data_dir, config.priority)
        .with_context(|| format!("Failed to open URL store in {}", data_dir.display()))
}

/// Handles the commands that only touch the URL store, filter and blocker
fn handle_store_command(config: &Config, command: Command) -> anyhow::Result<()> {
    let mut scheduler = open_scheduler(config)?;

    match command {
        Command::Add { urls } => {
            for url in &urls {
                match scheduler.add(url, "") {
                    AddOutcome::Added(id) => println!("Added #{}: {}", id, url),
                    AddOutcome::Duplicate => println!("Already known: {}", url),
                    AddOutcome::Filtered(reason) => println!("Rejected ({}): {}", reason, url),
                    AddOutcome::StoreError(e) => anyhow::bail!("Failed to add {}: {}", url, e),
                }
            }
        }
        Command::Block {
            pattern,
            kind,
            description,
        } => {
            let id = if kind == BlockKind::Exact {
                scheduler.block_url(&pattern, &description)?
            } else {
                scheduler
                    .blocker_mut()
                    .add_pattern(kind, &pattern, &description)?
            };
            println!("Added {} pattern #{}: {}", kind, id, pattern);
        }
        Command::Unblock { url } => {
            let removed = scheduler.unblock_url(&url)?;
            println!("Removed {} pattern(s) for {}", removed, url);
        }
        Command::UnblockPattern { id } => {
            scheduler.blocker_mut().remove_pattern(id)?;
            println!("Removed pattern #{}", id);
        }
        Command::Patterns => print_patterns(scheduler.blocker().patterns()),
        Command::Stats => {
            println!("Data directory: {}\n", config.crawler.data_dir.display());
            let stats = load_statistics(&scheduler, &config.crawler.data_dir)?;
            print_statistics(&stats);
        }
        Command::Export { path } => {
            let count = scheduler.export(&path)?;
            println!("✓ Exported {} URLs to {}", count, path.display());
        }
        Command::Import { path } => {
            let count = scheduler.import(&path)?;
            println!("✓ Imported {} new URLs from {}", count, path.display());
        }
        Command::Reset => {
            let count = scheduler.reset_all()?;
            println!("✓ Returned {} URLs to pending", count);
        }
        Command::Recalc => {
            let count = scheduler.recalculate_priorities()?;
            println!("✓ Recalculated {} priorities", count);
        }
        other => anyhow::bail!("{:?} is not a store command", other),
    }

    Ok(())
}

/// Handles the dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Pagefeed Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Data directory: {}", config.crawler.data_dir.display());
    if config.crawler.max_pages > 0 {
        println!("  Max pages: {}", config.crawler.max_pages);
    } else {
        println!("  Max pages: unlimited");
    }
    println!(
        "  Queue: {}",
        if config.crawler.use_legacy_queue {
            "legacy file"
        } else {
            "URL database"
        }
    );

    println!("\nFetch:");
    println!("  User agent: {}", config.fetch.user_agent);
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    println!("  Max redirects: {}", config.fetch.max_redirects);
    println!("  Max page size: {} bytes", config.fetch.max_page_bytes);
    println!("  Rate limit: {:?}", config.rate_limit.to_rate_limit());

    let pipeline = &config.pipeline;
    println!("\nPipeline:");
    println!(
        "  Threads: preprocess {}, tokenize {}, train {}",
        resolve_threads(pipeline.preprocess_threads),
        resolve_threads(pipeline.tokenize_threads),
        resolve_threads(pipeline.train_threads)
    );
    println!("  Epochs: {}", pipeline.epochs);
    println!("  Vocabulary size: {}", pipeline.vocab_size);
    println!("  Min text length: {}", pipeline.min_text_length);

    let scheduler = open_scheduler(config)?;
    println!("\nSeeds ({}):", config.crawler.seeds.len());
    let mut admitted = 0;
    for seed in &config.crawler.seeds {
        match scheduler.explain(seed) {
            None => {
                admitted += 1;
                println!("  ✓ {}", seed);
            }
            Some(reason) => println!("  ✗ {} ({})", seed, reason),
        }
    }

    let stats = scheduler.stats()?;
    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} admitted seeds and {} pending URLs",
        admitted, stats.pending
    );

    Ok(())
}

/// Handles the main crawl operation
///
/// The orchestrator is started and stopped outside the tokio runtime; its
/// blocking HTTP client must not be created or dropped on an async thread.
fn handle_run(config: Config) -> anyhow::Result<()> {
    let data_dir = config.crawler.data_dir.clone();
    let bounded = config.crawler.max_pages > 0;

    let mut orchestrator = Orchestrator::new(config, Arc::new(NullTrainer));
    orchestrator.set_event_callback(|event: CrawlerEvent, status: &StatusSnapshot| match event {
        CrawlerEvent::Started | CrawlerEvent::Stopped => tracing::info!("Crawler {}: {}", event, status),
        _ => tracing::debug!("{}: {}", event, status),
    });

    orchestrator.start().context("Failed to start crawler")?;
    tracing::info!("Press Ctrl-C to stop");

    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    let waited = runtime.block_on(wait_for_shutdown(&orchestrator, &data_dir, bounded));

    orchestrator.stop()?;
    println!("{}", orchestrator.status());
    waited
}

/// Waits for Ctrl-C, or for a bounded crawl to finish and drain
async fn wait_for_shutdown(
    orchestrator: &Orchestrator,
    data_dir: &Path,
    bounded: bool,
) -> anyhow::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut ticker = tokio::time::interval(FINISH_POLL);
    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Received Ctrl-C, shutting down");
                return Ok(());
            }
            _ = ticker.tick() => {
                if bounded && orchestrator.fetch_finished() && pipeline_settled(data_dir) {
                    tracing::info!("Page limit reached and pipeline drained");
                    return Ok(());
                }
            }
        }
    }
}

/// True when every fetched page has made it through to `trained/`
fn pipeline_settled(data_dir: &Path) -> bool {
    let counts = DirCounts::scan(data_dir);
    counts.raw == counts.preprocessed
        && counts.preprocessed == counts.tokenized
        && counts.tokenized == counts.trained
}
