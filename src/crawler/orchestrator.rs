//! Crawl orchestration: seeding, the worker pool and the stop decision
//!
//! The orchestrator keeps its own database connection for seeding and
//! progress queries. Each worker opens a separate connection. The only
//! state shared in memory is the stop signal.

use crate::config::Config;
use crate::crawler::fetcher::build_http_client;
use crate::crawler::seeder::Seeder;
use crate::crawler::worker::{Worker, WorkerSettings};
use crate::output::{load_source_progress, load_statistics, log_progress};
use crate::queue::{QueueManager, RateLimiter};
use crate::state::JobStatus;
use crate::storage::{open_storage, SqliteStorage, Storage};
use crate::Result;
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Options for a single run
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Seed the queue first (only happens while the active queue is short)
    pub seed: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { seed: true }
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    Interrupted,
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reason: StopReason,
    /// Documents across configured sources when the run ended
    pub documents: u64,
    pub target: u64,
    /// Documents added during this run
    pub collected: u64,
    /// Jobs handled by the workers
    pub jobs_processed: u64,
    pub elapsed: Duration,
}

/// Owns the worker pool for one crawl run
pub struct Orchestrator {
    config: Arc<Config>,
    client: Client,
    worker_settings: WorkerSettings,
    poll_interval: Duration,
    report_interval: Duration,
}

impl Orchestrator {
    /// Creates an orchestrator with settings taken from the configuration
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.crawler.timeout_seconds),
        )?;

        Ok(Self {
            worker_settings: WorkerSettings::from_config(&config.crawler),
            poll_interval: Duration::from_secs(config.crawler.poll_interval_seconds),
            report_interval: Duration::from_secs(config.crawler.report_interval_seconds),
            config: Arc::new(config),
            client,
        })
    }

    /// Overrides the settings handed to every worker
    pub fn with_worker_settings(mut self, settings: WorkerSettings) -> Self {
        self.worker_settings = settings;
        self
    }

    /// Overrides the progress polling and reporting cadence
    pub fn with_intervals(mut self, poll: Duration, report: Duration) -> Self {
        self.poll_interval = poll;
        self.report_interval = report;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens a new connection wrapped in a queue manager
    pub fn open_queue(&self) -> Result<QueueManager<SqliteStorage>> {
        let storage = open_storage(&self.config.database)?;
        Ok(QueueManager::new(
            storage,
            RateLimiter::from_sources(&self.config.sources),
        ))
    }

    /// Seeds every source, unless the queue already holds enough active jobs
    ///
    /// A failing source is logged and skipped.
    ///
    /// # Returns
    ///
    /// The number of jobs newly inserted across all sources
    pub async fn seed_if_needed<S: Storage>(&self, manager: &mut QueueManager<S>) -> Result<u64> {
        let counts = manager.storage().count_jobs_by_status()?;
        let active: u64 = JobStatus::ALL
            .iter()
            .filter(|status| status.is_active())
            .map(|status| counts.get(status).copied().unwrap_or(0))
            .sum();

        if active >= self.config.crawler.reseed_threshold {
            tracing::info!(
                "Queue holds {} active jobs (threshold {}), skipping seeding",
                active,
                self.config.crawler.reseed_threshold
            );
            return Ok(0);
        }

        let seeder = Seeder::new(&self.client);
        let mut inserted = 0;
        for source in &self.config.sources {
            match seeder.seed(manager, source, source.seed_cap()).await {
                Ok(count) => inserted += count,
                Err(e) => tracing::error!("Seeding {} failed: {}", source.name, e),
            }
        }

        Ok(inserted)
    }

    /// Runs the crawl until the total target is reached or `interrupt` completes
    ///
    /// On stop, every worker finishes its current job before this returns.
    /// Leases left behind by an abrupt exit are reclaimed on the next run.
    pub async fn run<F>(&self, options: RunOptions, interrupt: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let start = Instant::now();
        let target = self.config.total_target();

        let mut manager = self.open_queue()?;
        if options.seed {
            self.seed_if_needed(&mut manager).await?;
        }

        let initial = tracked_documents(manager.storage(), &self.config)?;
        if initial >= target {
            tracing::info!("Target already reached: {}/{}", initial, target);
            return Ok(RunSummary {
                reason: StopReason::TargetReached,
                documents: initial,
                target,
                collected: 0,
                jobs_processed: 0,
                elapsed: start.elapsed(),
            });
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut workers = JoinSet::new();
        let sources = Arc::new(self.config.sources.clone());

        for id in 0..self.config.crawler.workers as usize {
            let worker = Worker::new(
                id,
                self.open_queue()?,
                self.client.clone(),
                Arc::clone(&sources),
                self.worker_settings.clone(),
            );
            workers.spawn(worker.run(stop_rx.clone()));
        }

        tracing::info!(
            "Started {} workers, target {} documents ({} already stored)",
            self.config.crawler.workers,
            target,
            initial
        );

        let mut poll = tokio::time::interval_at(
            tokio::time::Instant::now() + self.poll_interval,
            self.poll_interval,
        );
        let mut last_report: Option<Instant> = None;
        tokio::pin!(interrupt);

        let reason = loop {
            tokio::select! {
                _ = &mut interrupt => break StopReason::Interrupted,
                _ = poll.tick() => {}
            }

            let total = match tracked_documents(manager.storage(), &self.config) {
                Ok(total) => total,
                Err(e) => {
                    tracing::warn!("Progress query failed: {}", e);
                    continue;
                }
            };

            if last_report.map_or(true, |t| t.elapsed() >= self.report_interval) {
                self.report(manager.storage(), initial, start);
                last_report = Some(Instant::now());
            }

            if total >= target {
                tracing::info!("Target reached: {}/{}", total, target);
                break StopReason::TargetReached;
            }
        };

        if reason == StopReason::Interrupted {
            tracing::info!("Stop requested, waiting for workers to finish their current jobs");
        }

        let _ = stop_tx.send(true);
        let mut jobs_processed = 0;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(count) => jobs_processed += count,
                Err(e) => tracing::error!("Worker task failed: {}", e),
            }
        }

        self.report(manager.storage(), initial, start);
        let documents = tracked_documents(manager.storage(), &self.config)?;

        Ok(RunSummary {
            reason,
            documents,
            target,
            collected: documents.saturating_sub(initial),
            jobs_processed,
            elapsed: start.elapsed(),
        })
    }

    fn report<S: Storage>(&self, storage: &S, initial: u64, start: Instant) {
        match load_statistics(storage, &self.config) {
            Ok(stats) => {
                let collected = stats.total_documents.saturating_sub(initial);
                log_progress(&stats, collected, start.elapsed());
            }
            Err(e) => tracing::warn!("Failed to load statistics: {}", e),
        }
    }
}

/// Documents across the configured sources
fn tracked_documents<S: Storage>(storage: &S, config: &Config) -> Result<u64> {
    Ok(load_source_progress(storage, config)?
        .iter()
        .map(|s| s.documents)
        .sum())
}

/// Completes on the first Ctrl+C
///
/// After the first interrupt, a second Ctrl+C exits the process immediately.
pub async fn ctrl_c_interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }

    tracing::info!("Interrupt received (press Ctrl+C again to exit immediately)");

    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nForce quit requested, exiting immediately...");
            std::process::exit(130);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::storage::DocumentRecord;

    fn config(db_path: &str, reseed_threshold: u64) -> Config {
        parse_config(&format!(
            r#"
[database]
path = "{}"

[crawler]
workers = 1
reseed-threshold = {}

[user-agent]
crawler-name = "TestHarvester"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[[source]]
name = "wiki"
target = 1
allowed-hosts = ["127.0.0.1"]
url-base = "http://127.0.0.1:9/wiki/"

[source.seed]
kind = "mediawiki-category"
api-url = "http://127.0.0.1:9/w/api.php"
categories = ["Category:Physics"]
"#,
            db_path, reseed_threshold
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_seeding_skipped_when_queue_is_full() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("harvest.db");
        let orchestrator = Orchestrator::new(config(db.to_str().unwrap(), 1)).unwrap();

        let mut manager = orchestrator.open_queue().unwrap();
        manager
            .enqueue("wiki", "http://127.0.0.1:9/wiki/Atom", 2)
            .unwrap();

        // The API address is unreachable, so any attempt to seed would fail.
        assert_eq!(orchestrator.seed_if_needed(&mut manager).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_returns_immediately_when_target_met() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("harvest.db");
        let orchestrator = Orchestrator::new(config(db.to_str().unwrap(), 0)).unwrap();

        let mut manager = orchestrator.open_queue().unwrap();
        manager
            .store_document(&DocumentRecord {
                url_norm: "http://127.0.0.1:9/wiki/Atom".to_string(),
                raw_url: "http://127.0.0.1:9/wiki/Atom".to_string(),
                source: "wiki".to_string(),
                fetched_at: 0,
                raw_content: String::new(),
                extracted_text: String::new(),
                content_hash: String::new(),
                http_status: 200,
            })
            .unwrap();

        let summary = orchestrator
            .run(RunOptions { seed: false }, std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.reason, StopReason::TargetReached);
        assert_eq!(summary.documents, 1);
        assert_eq!(summary.collected, 0);
        assert_eq!(summary.jobs_processed, 0);
    }

    #[tokio::test]
    async fn test_interrupt_drains_workers() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("harvest.db");
        let orchestrator = Orchestrator::new(config(db.to_str().unwrap(), 0)).unwrap();

        let summary = orchestrator
            .run(
                RunOptions { seed: false },
                tokio::time::sleep(Duration::from_millis(50)),
            )
            .await
            .unwrap();

        assert_eq!(summary.reason, StopReason::Interrupted);
        assert_eq!(summary.documents, 0);
    }
}
