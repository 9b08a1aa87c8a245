//! Queue manager: the job lifecycle over a storage backend
//!
//! Every operation maps onto one atomic storage call, so any number of
//! managers (one per worker, each with its own connection) can share a
//! database without in-process locking.

use crate::queue::rate_limit::RateLimiter;
use crate::storage::{DocumentRecord, NewJob, QueueItem, Storage, StorageResult};
use crate::url::normalize_url;
use chrono::Utc;

/// Current time as Unix seconds
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Exposes enqueue/acquire/complete/retry/fail/reclaim over a [`Storage`]
pub struct QueueManager<S: Storage> {
    storage: S,
    limiter: RateLimiter,
}

impl<S: Storage> QueueManager<S> {
    /// Creates a manager over a storage backend
    ///
    /// # Arguments
    ///
    /// * `storage` - The backend; owned exclusively by this manager
    /// * `limiter` - Per-source document caps consulted by [`Self::acquire`]
    pub fn new(storage: S, limiter: RateLimiter) -> Self {
        Self { storage, limiter }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Adds a URL to the queue as a pending job
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - A new job was created
    /// * `Ok(false)` - A document or a job with the same normalized URL
    ///   already exists (including one inserted concurrently)
    pub fn enqueue(&mut self, source: &str, url: &str, priority: i64) -> StorageResult<bool> {
        let url_norm = normalize_url(url);
        let inserted = self.storage.insert_pending(
            NewJob {
                url_norm: &url_norm,
                raw_url: url,
                source,
                priority,
            },
            unix_now(),
        )?;

        if inserted {
            tracing::trace!("Enqueued {} for {}", url_norm, source);
        }

        Ok(inserted)
    }

    /// Leases the next eligible job for `worker_id`
    ///
    /// Only sources still below their document cap are considered. Returns
    /// `Ok(None)` when every source is at its cap or nothing is eligible yet.
    pub fn acquire(
        &mut self,
        worker_id: &str,
        lease_seconds: u64,
    ) -> StorageResult<Option<QueueItem>> {
        let sources = self.limiter.eligible_sources(&self.storage)?;
        if sources.is_empty() {
            return Ok(None);
        }

        let now = unix_now();
        let lease_until = now.saturating_add(i64::try_from(lease_seconds).unwrap_or(i64::MAX));
        self.storage
            .claim_next(&sources, worker_id, now, lease_until)
    }

    /// Returns every job with an expired lease to `pending`
    pub fn reclaim_stale_leases(&mut self) -> StorageResult<u64> {
        let released = self.storage.release_expired(unix_now())?;
        if released > 0 {
            tracing::info!("Reclaimed {} stale leases", released);
        }
        Ok(released)
    }

    /// Marks a job done
    pub fn complete(&mut self, url_norm: &str) -> StorageResult<()> {
        self.storage.mark_done(url_norm, unix_now())
    }

    /// Returns a job to `pending`, eligible again after `backoff_seconds`
    pub fn retry(
        &mut self,
        url_norm: &str,
        attempts: u32,
        error: &str,
        backoff_seconds: u64,
    ) -> StorageResult<()> {
        let now = unix_now();
        let next_fetch_at =
            now.saturating_add(i64::try_from(backoff_seconds).unwrap_or(i64::MAX));
        self.storage
            .mark_retry(url_norm, attempts, error, next_fetch_at, now)
    }

    /// Freezes a job in terminal `error`
    pub fn fail(&mut self, url_norm: &str, attempts: u32, error: &str) -> StorageResult<()> {
        self.storage.mark_error(url_norm, attempts, error, unix_now())
    }

    pub fn document_exists(&self, url_norm: &str) -> StorageResult<bool> {
        self.storage.document_exists(url_norm)
    }

    pub fn store_document(&mut self, doc: &DocumentRecord) -> StorageResult<()> {
        self.storage.upsert_document(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::JobStatus;
    use crate::storage::SqliteStorage;

    fn manager(caps: &[(&str, u64)]) -> QueueManager<SqliteStorage> {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let limiter = RateLimiter::new(
            caps.iter()
                .map(|(name, cap)| (name.to_string(), *cap))
                .collect(),
        );
        QueueManager::new(storage, limiter)
    }

    fn document(url_norm: &str, source: &str) -> DocumentRecord {
        DocumentRecord {
            url_norm: url_norm.to_string(),
            raw_url: url_norm.to_string(),
            source: source.to_string(),
            fetched_at: unix_now(),
            raw_content: "<p>x</p>".to_string(),
            extracted_text: "x".to_string(),
            content_hash: "h".to_string(),
            http_status: 200,
        }
    }

    #[test]
    fn test_enqueue_normalizes_and_dedups() {
        let mut manager = manager(&[("wiki", 10)]);

        assert!(manager
            .enqueue("wiki", "https://EN.wikipedia.org/wiki/Atom#History", 2)
            .unwrap());
        assert!(!manager
            .enqueue("wiki", "en.wikipedia.org/wiki/Atom", 2)
            .unwrap());

        let item = manager
            .storage()
            .get_queue_item("https://en.wikipedia.org/wiki/Atom")
            .unwrap()
            .unwrap();
        assert_eq!(item.raw_url, "https://EN.wikipedia.org/wiki/Atom#History");
        assert_eq!(item.status, JobStatus::Pending);
    }

    #[test]
    fn test_enqueue_skips_fetched_document() {
        let mut manager = manager(&[("wiki", 10)]);
        manager
            .store_document(&document("https://en.wikipedia.org/wiki/Atom", "wiki"))
            .unwrap();

        assert!(!manager
            .enqueue("wiki", "https://en.wikipedia.org/wiki/Atom", 2)
            .unwrap());
    }

    #[test]
    fn test_acquire_leases_job() {
        let mut manager = manager(&[("wiki", 10)]);
        manager
            .enqueue("wiki", "https://en.wikipedia.org/wiki/Atom", 2)
            .unwrap();

        let before = unix_now();
        let item = manager.acquire("worker-0", 120).unwrap().unwrap();
        assert_eq!(item.status, JobStatus::InProgress);
        assert_eq!(item.locked_by.as_deref(), Some("worker-0"));
        assert!(item.locked_until >= before + 120);

        assert!(manager.acquire("worker-1", 120).unwrap().is_none());
    }

    #[test]
    fn test_acquire_skips_capped_source() {
        let mut manager = manager(&[("wiki", 1), ("books", 5)]);
        manager
            .store_document(&document("https://en.wikipedia.org/wiki/Done", "wiki"))
            .unwrap();
        manager
            .enqueue("wiki", "https://en.wikipedia.org/wiki/Atom", 1)
            .unwrap();

        assert!(manager.acquire("worker-0", 120).unwrap().is_none());

        manager
            .enqueue("books", "https://en.wikibooks.org/wiki/Physics", 2)
            .unwrap();
        let item = manager.acquire("worker-0", 120).unwrap().unwrap();
        assert_eq!(item.source, "books");
    }

    #[test]
    fn test_retry_delays_eligibility() {
        let mut manager = manager(&[("wiki", 10)]);
        manager
            .enqueue("wiki", "https://en.wikipedia.org/wiki/Atom", 2)
            .unwrap();
        let item = manager.acquire("worker-0", 120).unwrap().unwrap();

        manager
            .retry(&item.url_norm, 1, "HTTP 503", 30)
            .unwrap();

        let stored = manager
            .storage()
            .get_queue_item(&item.url_norm)
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, JobStatus::Pending);
        assert_eq!(stored.attempts, 1);
        assert_eq!(stored.last_error.as_deref(), Some("HTTP 503"));
        assert_eq!(stored.locked_by, None);
        assert!(stored.next_fetch_at >= stored.updated_at + 30);

        assert!(manager.acquire("worker-0", 120).unwrap().is_none());
    }

    #[test]
    fn test_complete_and_fail() {
        let mut manager = manager(&[("wiki", 10)]);
        manager
            .enqueue("wiki", "https://en.wikipedia.org/wiki/A", 2)
            .unwrap();
        manager
            .enqueue("wiki", "https://en.wikipedia.org/wiki/B", 2)
            .unwrap();

        let a = manager.acquire("worker-0", 120).unwrap().unwrap();
        let b = manager.acquire("worker-0", 120).unwrap().unwrap();
        manager.complete(&a.url_norm).unwrap();
        manager.fail(&b.url_norm, 3, "HTTP 404").unwrap();

        let counts = manager.storage().count_jobs_by_status().unwrap();
        assert_eq!(counts.get(&JobStatus::Done), Some(&1));
        assert_eq!(counts.get(&JobStatus::Error), Some(&1));
        assert!(manager.acquire("worker-0", 120).unwrap().is_none());
    }

    #[test]
    fn test_reclaim_keeps_live_leases() {
        let mut manager = manager(&[("wiki", 10)]);
        manager
            .enqueue("wiki", "https://en.wikipedia.org/wiki/A", 2)
            .unwrap();
        manager.acquire("worker-0", 3_600).unwrap().unwrap();

        assert_eq!(manager.reclaim_stale_leases().unwrap(), 0);
    }
}
