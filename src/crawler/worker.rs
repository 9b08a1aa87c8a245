//! Crawl worker: acquire, fetch, store, discover, report
//!
//! Each worker owns its own queue manager (and therefore its own database
//! connection) and HTTP client handle. Workers never wait on each other; the
//! queue's atomic claim is the only coordination between them.

use crate::config::{CrawlerConfig, SourceConfig};
use crate::crawler::fetcher::{describe_error, fetch_page, FetchedPage, ResponseClass};
use crate::crawler::parser::{extract_wiki_links, html_to_text};
use crate::queue::{unix_now, Disposition, FailureKind, QueueManager, RetryPolicy};
use crate::storage::{DocumentRecord, QueueItem, Storage};
use crate::url::normalize_url;
use crate::Result;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use url::Url;

/// Priority given to links discovered on fetched pages
pub const DISCOVERED_LINK_PRIORITY: i64 = 2;

/// Sleep schedule for a worker that finds nothing to do
///
/// | Consecutive empty polls | Sleep |
/// |-------------------------|-------|
/// | below `threshold` | `short` |
/// | `threshold` or more | `long` |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleSchedule {
    pub short: Duration,
    pub long: Duration,
    pub threshold: u32,
}

impl Default for IdleSchedule {
    fn default() -> Self {
        Self {
            short: Duration::from_secs(1),
            long: Duration::from_secs(3),
            threshold: 5,
        }
    }
}

impl IdleSchedule {
    /// Sleep after the `consecutive_empty`-th empty poll in a row
    pub fn delay_for(&self, consecutive_empty: u32) -> Duration {
        if consecutive_empty < self.threshold {
            self.short
        } else {
            self.long
        }
    }
}

/// Timing and retry settings shared by all workers
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub lease_seconds: u64,
    /// Politeness delay after every processed job
    pub delay: Duration,
    pub retry: RetryPolicy,
    pub idle: IdleSchedule,
    /// Pause after an iteration failed unexpectedly
    pub error_pause: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            lease_seconds: config.lease_seconds,
            delay: Duration::from_millis(config.delay_ms),
            retry: RetryPolicy::new(config.max_retries),
            idle: IdleSchedule::default(),
            error_pause: Duration::from_secs(2),
        }
    }
}

/// What happened to an acquired job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Page stored; `links` new jobs were enqueued
    Stored { links: usize },
    /// A document already existed; the job was completed without fetching
    AlreadyStored,
    /// Redirect resolved; `target` is the normalized target if one was given
    Redirected { target: Option<String> },
    /// Job returned to the queue
    Retried { attempts: u32, backoff_seconds: u64 },
    /// Job frozen in terminal error
    Failed { attempts: u32 },
}

/// A single crawl worker
pub struct Worker<S: Storage> {
    id: usize,
    name: String,
    manager: QueueManager<S>,
    client: Client,
    sources: Arc<Vec<SourceConfig>>,
    settings: WorkerSettings,
}

impl<S: Storage> Worker<S> {
    /// Creates a worker
    ///
    /// Worker 0 is the one that reclaims stale leases.
    pub fn new(
        id: usize,
        manager: QueueManager<S>,
        client: Client,
        sources: Arc<Vec<SourceConfig>>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            id,
            name: format!("worker-{}", id),
            manager,
            client,
            sources,
            settings,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manager(&self) -> &QueueManager<S> {
        &self.manager
    }

    /// Runs until the stop signal is raised
    ///
    /// The signal is checked once per iteration; a fetch in flight always
    /// finishes (or times out) first. Returns the number of jobs processed.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> u64 {
        tracing::debug!("{} started", self.name);

        let mut processed = 0;
        let mut consecutive_empty: u32 = 0;

        while !stop_requested(&stop) {
            match self.run_once().await {
                Ok(Some(outcome)) => {
                    consecutive_empty = 0;
                    processed += 1;
                    tracing::trace!("{}: {:?}", self.name, outcome);
                    pause(&mut stop, self.settings.delay).await;
                }
                Ok(None) => {
                    consecutive_empty = consecutive_empty.saturating_add(1);
                    pause(&mut stop, self.settings.idle.delay_for(consecutive_empty)).await;
                }
                Err(e) => {
                    tracing::error!("{} iteration failed: {}", self.name, e);
                    pause(&mut stop, self.settings.error_pause).await;
                }
            }
        }

        tracing::debug!("{} stopped after {} jobs", self.name, processed);
        processed
    }

    /// One iteration without sleeping
    ///
    /// # Returns
    ///
    /// * `Ok(Some(outcome))` - A job was acquired and handled
    /// * `Ok(None)` - Nothing was eligible
    pub async fn run_once(&mut self) -> Result<Option<JobOutcome>> {
        if self.id == 0 {
            self.manager.reclaim_stale_leases()?;
        }

        let Some(job) = self
            .manager
            .acquire(&self.name, self.settings.lease_seconds)?
        else {
            return Ok(None);
        };

        self.process_job(&job).await.map(Some)
    }

    /// Fetches a leased job and reports the outcome to the queue
    pub async fn process_job(&mut self, job: &QueueItem) -> Result<JobOutcome> {
        if self.manager.document_exists(&job.url_norm)? {
            self.manager.complete(&job.url_norm)?;
            return Ok(JobOutcome::AlreadyStored);
        }

        tracing::debug!("{} fetching {}", self.name, job.raw_url);

        let page = match fetch_page(&self.client, &job.raw_url).await {
            Ok(page) => page,
            Err(e) => {
                let error = describe_error(&e);
                return self.record_failure(job, FailureKind::Other, &error);
            }
        };

        match page.class() {
            ResponseClass::Ok => self.store_page(job, page),
            ResponseClass::Redirect => self.follow_redirect(job, &page),
            ResponseClass::Transient => {
                self.record_failure(job, FailureKind::TransientStatus, &status_error(&page))
            }
            ResponseClass::Unexpected => {
                self.record_failure(job, FailureKind::Other, &status_error(&page))
            }
        }
    }

    fn store_page(&mut self, job: &QueueItem, page: FetchedPage) -> Result<JobOutcome> {
        let extracted_text = html_to_text(&page.body);
        let links = self.discover_links(job, &page.body);

        let doc = DocumentRecord {
            url_norm: job.url_norm.clone(),
            raw_url: job.raw_url.clone(),
            source: job.source.clone(),
            fetched_at: unix_now(),
            content_hash: content_hash(&page.body),
            raw_content: page.body,
            extracted_text,
            http_status: page.status,
        };
        self.manager.store_document(&doc)?;

        let mut enqueued = 0;
        for link in &links {
            if self
                .manager
                .enqueue(&job.source, link, DISCOVERED_LINK_PRIORITY)?
            {
                enqueued += 1;
            }
        }

        self.manager.complete(&job.url_norm)?;
        tracing::debug!(
            "{} stored {} ({} links, {} new)",
            self.name,
            job.url_norm,
            links.len(),
            enqueued
        );

        Ok(JobOutcome::Stored { links: enqueued })
    }

    /// Links are followed under the job's own source
    fn discover_links(&self, job: &QueueItem, body: &str) -> Vec<String> {
        let Some(source) = self.sources.iter().find(|s| s.name == job.source) else {
            tracing::warn!(
                "{}: source '{}' is not configured, not following links",
                self.name,
                job.source
            );
            return Vec::new();
        };

        match Url::parse(&job.raw_url) {
            Ok(base) => extract_wiki_links(body, &base, &source.allowed_hosts, &source.path_prefix),
            Err(e) => {
                tracing::debug!("Cannot resolve links against {}: {}", job.raw_url, e);
                Vec::new()
            }
        }
    }

    fn follow_redirect(&mut self, job: &QueueItem, page: &FetchedPage) -> Result<JobOutcome> {
        let target = page
            .location
            .as_deref()
            .and_then(|location| resolve_location(&job.raw_url, location));

        if let Some(target) = &target {
            self.manager.enqueue(&job.source, target, job.priority)?;
            tracing::debug!(
                "{} {} redirected ({}) to {}",
                self.name,
                job.url_norm,
                page.status,
                target
            );
        }

        self.manager.complete(&job.url_norm)?;
        Ok(JobOutcome::Redirected { target })
    }

    fn record_failure(
        &mut self,
        job: &QueueItem,
        kind: FailureKind,
        error: &str,
    ) -> Result<JobOutcome> {
        match self.settings.retry.decide(job.attempts, kind) {
            Disposition::Retry {
                attempts,
                backoff_seconds,
            } => {
                self.manager
                    .retry(&job.url_norm, attempts, error, backoff_seconds)?;
                tracing::warn!(
                    "{} retrying {} in {}s (attempt {}): {}",
                    self.name,
                    job.url_norm,
                    backoff_seconds,
                    attempts,
                    error
                );
                Ok(JobOutcome::Retried {
                    attempts,
                    backoff_seconds,
                })
            }
            Disposition::Fail { attempts } => {
                self.manager.fail(&job.url_norm, attempts, error)?;
                tracing::warn!(
                    "{} giving up on {} after {} attempts: {}",
                    self.name,
                    job.url_norm,
                    attempts,
                    error
                );
                Ok(JobOutcome::Failed { attempts })
            }
        }
    }
}

/// True once the signal is raised or its sender is gone
fn stop_requested(stop: &watch::Receiver<bool>) -> bool {
    *stop.borrow() || stop.has_changed().is_err()
}

/// Sleeps, waking early if the stop signal changes
async fn pause(stop: &mut watch::Receiver<bool>, duration: Duration) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = stop.changed() => {}
    }
}

/// Resolves a `Location` header against the request URL and normalizes it
pub fn resolve_location(request_url: &str, location: &str) -> Option<String> {
    let location = location.trim();
    if location.is_empty() {
        return None;
    }

    let resolved = match Url::parse(request_url) {
        Ok(base) => base.join(location).ok()?.to_string(),
        Err(_) => location.to_string(),
    };

    Some(normalize_url(&resolved))
}

/// SHA-256 of the page body, hex encoded
pub fn content_hash(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

fn status_error(page: &FetchedPage) -> String {
    format!("HTTP {}", page.status)
}
