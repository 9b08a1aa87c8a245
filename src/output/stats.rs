//! Statistics generation from the crawl database
//!
//! Progress is always derived from read-only queries against the shared
//! store; nothing is counted in memory.

use crate::config::Config;
use crate::state::JobStatus;
use crate::storage::{Storage, StorageResult};
use std::collections::HashMap;
use std::time::Duration;

/// Document count for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceProgress {
    pub name: String,
    pub documents: u64,
    pub target: u64,
}

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Per-source document counts, in configuration order
    pub sources: Vec<SourceProgress>,

    /// Documents across the configured sources
    pub total_documents: u64,

    /// Sum of the per-source targets
    pub target: u64,

    /// Every stored document, including sources no longer configured
    pub stored_documents: u64,

    /// Count of jobs by status
    pub jobs_by_status: HashMap<JobStatus, u64>,
}

impl CrawlStatistics {
    pub fn jobs(&self, status: JobStatus) -> u64 {
        self.jobs_by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn total_jobs(&self) -> u64 {
        self.jobs_by_status.values().sum()
    }
}

/// Counts documents for every configured source
pub fn load_source_progress<S: Storage + ?Sized>(
    storage: &S,
    config: &Config,
) -> StorageResult<Vec<SourceProgress>> {
    config
        .sources
        .iter()
        .map(|source| {
            Ok(SourceProgress {
                name: source.name.clone(),
                documents: storage.count_documents_for_source(&source.name)?,
                target: source.target,
            })
        })
        .collect()
}

/// Loads statistics from storage
pub fn load_statistics<S: Storage + ?Sized>(
    storage: &S,
    config: &Config,
) -> StorageResult<CrawlStatistics> {
    let sources = load_source_progress(storage, config)?;
    let total_documents = sources.iter().map(|s| s.documents).sum();
    let jobs_by_status = storage.count_jobs_by_status()?;

    Ok(CrawlStatistics {
        sources,
        total_documents,
        target: config.total_target(),
        stored_documents: storage.count_documents()?,
        jobs_by_status,
    })
}

/// Documents per hour; `elapsed` is clamped to at least one second
pub fn docs_per_hour(documents: u64, elapsed: Duration) -> f64 {
    let seconds = elapsed.as_secs_f64().max(1.0);
    documents as f64 * 3600.0 / seconds
}

/// One-line `name=count/target` summary of every source
pub fn format_sources(sources: &[SourceProgress]) -> String {
    sources
        .iter()
        .map(|s| format!("{}={}/{}", s.name, s.documents, s.target))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One-line `status=count` summary in lifecycle order
pub fn format_queue(stats: &CrawlStatistics) -> String {
    JobStatus::ALL
        .iter()
        .map(|status| format!("{}={}", status, stats.jobs(*status)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Emits a periodic progress report
///
/// # Arguments
///
/// * `stats` - Current statistics
/// * `collected` - Documents collected since the run started
/// * `elapsed` - Time since the run started
pub fn log_progress(stats: &CrawlStatistics, collected: u64, elapsed: Duration) {
    tracing::info!(
        "Documents: {} total={}/{}",
        format_sources(&stats.sources),
        stats.total_documents,
        stats.target
    );
    tracing::info!("Queue: {}", format_queue(stats));
    tracing::info!(
        "Speed: {:.1} docs/hour ({} this run)",
        docs_per_hour(collected, elapsed),
        collected
    );
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Documents:");
    for source in &stats.sources {
        let percentage = if source.target > 0 {
            (source.documents as f64 / source.target as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "  {}: {} / {} ({:.1}%)",
            source.name, source.documents, source.target, percentage
        );
    }
    println!("  Total: {} / {}", stats.total_documents, stats.target);
    if stats.stored_documents != stats.total_documents {
        println!("  Stored (all sources): {}", stats.stored_documents);
    }
    println!();

    println!("Queue ({} jobs):", stats.total_jobs());
    for status in JobStatus::ALL {
        println!("  {}: {}", status, stats.jobs(status));
    }
}
