//! Wiki-Harvest main entry point
//!
//! This is the command-line interface for the Wiki-Harvest crawler.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wiki_harvest::config::{load_config_with_hash, Config};
use wiki_harvest::crawler::{ctrl_c_interrupt, Orchestrator, RunOptions, StopReason};
use wiki_harvest::output::{export_corpus, load_statistics, print_statistics};
use wiki_harvest::storage::open_storage;

/// Wiki-Harvest: a polite, rate-limited wiki crawler
///
/// Wiki-Harvest fills a SQLite document store from the configured wiki
/// sources until every source reaches its document target. Interrupted runs
/// resume from the persisted queue.
#[derive(Parser, Debug)]
#[command(name = "wiki-harvest")]
#[command(version)]
#[command(about = "A polite, rate-limited wiki crawler", long_about = None)]
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

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "export_corpus"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_corpus"])]
    stats: bool,

    /// Write the collected text to PATH and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "stats"])]
    export_corpus: Option<PathBuf>,

    /// Do not seed the queue before crawling
    #[arg(long)]
    no_seed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(path) = &cli.export_corpus {
        handle_export_corpus(&config, path)?;
    } else {
        handle_crawl(config, !cli.no_seed).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("wiki_harvest=info,warn"),
            1 => EnvFilter::new("wiki_harvest=debug,info"),
            2 => EnvFilter::new("wiki_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Wiki-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", config.crawler.workers);
    println!("  Request timeout: {}s", config.crawler.timeout_seconds);
    println!("  Politeness delay: {}ms", config.crawler.delay_ms);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Lease: {}s", config.crawler.lease_seconds);
    println!("  Reseed threshold: {}", config.crawler.reseed_threshold);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nDatabase:");
    println!("  Path: {}", config.database.path);
    println!(
        "  Tables: {}, {}",
        config.database.documents_table, config.database.queue_table
    );

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        println!(
            "  - {} (target {}, priority {})",
            source.name, source.target, source.priority
        );
        println!("    Hosts: {}", source.allowed_hosts.join(", "));
        println!("    Articles: {}<title>", source.url_base);
        match &source.seed {
            Some(seed) => {
                println!(
                    "    Seed: {} via {} (cap {})",
                    seed.categories.join(", "),
                    seed.api_url,
                    source.seed_cap()
                );
            }
            None => println!("    Seed: none"),
        }
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would collect {} documents with {} workers",
        config.total_target(),
        config.crawler.workers
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.database.path);

    let storage = open_storage(&config.database)
        .with_context(|| format!("failed to open database {}", config.database.path))?;
    let stats = load_statistics(&storage, config)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-corpus mode
fn handle_export_corpus(config: &Config, path: &std::path::Path) -> anyhow::Result<()> {
    let storage = open_storage(&config.database)
        .with_context(|| format!("failed to open database {}", config.database.path))?;

    let written = export_corpus(&storage, path)
        .with_context(|| format!("failed to export corpus to {}", path.display()))?;

    println!("✓ Exported {} documents to {}", written, path.display());
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, seed: bool) -> anyhow::Result<()> {
    tracing::info!(
        "Sources: {}, total target: {} documents",
        config.sources.len(),
        config.total_target()
    );

    let orchestrator = Orchestrator::new(config).context("failed to build HTTP client")?;

    let summary = orchestrator
        .run(RunOptions { seed }, ctrl_c_interrupt())
        .await
        .context("crawl failed")?;

    match summary.reason {
        StopReason::TargetReached => tracing::info!(
            "Target reached: {}/{} documents ({} this run, {} jobs in {:?})",
            summary.documents,
            summary.target,
            summary.collected,
            summary.jobs_processed,
            summary.elapsed
        ),
        StopReason::Interrupted => tracing::info!(
            "Stopped at {}/{} documents ({} this run); the queue resumes on the next start",
            summary.documents,
            summary.target,
            summary.collected
        ),
    }

    Ok(())
}
