//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::JobStatus;
use crate::storage::{DocumentRecord, NewJob, QueueItem};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Queue item not found: {0}")]
    NotFound(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Backends must make every queue mutation a single atomic operation. In
/// particular [`Storage::claim_next`] must behave as a compare-and-set: two
/// callers can never both receive the same job.
///
/// Timestamps are Unix seconds supplied by the caller.
pub trait Storage {
    // ===== Document Store =====

    /// Returns true if a document exists for the key
    fn document_exists(&self, url_norm: &str) -> StorageResult<bool>;

    /// Gets a document by key
    fn get_document(&self, url_norm: &str) -> StorageResult<Option<DocumentRecord>>;

    /// Inserts a document, overwriting any previous version with the same key
    fn upsert_document(&mut self, doc: &DocumentRecord) -> StorageResult<()>;

    /// Counts documents collected for a source
    fn count_documents_for_source(&self, source: &str) -> StorageResult<u64>;

    /// Counts all documents
    fn count_documents(&self) -> StorageResult<u64>;

    /// Streams every document in insertion order, returning how many were visited
    fn visit_documents(
        &self,
        visit: &mut dyn FnMut(DocumentRecord) -> StorageResult<()>,
    ) -> StorageResult<u64>;

    // ===== Job Queue =====

    /// Gets a job by key
    fn get_queue_item(&self, url_norm: &str) -> StorageResult<Option<QueueItem>>;

    /// Inserts a pending job unless a document or a job already has the key
    ///
    /// # Returns
    ///
    /// `true` if a row was inserted. A concurrent insert of the same key
    /// yields `false`, never an error.
    fn insert_pending(&mut self, job: NewJob<'_>, now: i64) -> StorageResult<bool>;

    /// Atomically leases the best eligible pending job
    ///
    /// Eligible: `status = pending`, `source` in `sources`,
    /// `next_fetch_at <= now`. Best: lowest `(priority, next_fetch_at,
    /// created_at)`. The returned item is already `in_progress`.
    fn claim_next(
        &mut self,
        sources: &[String],
        worker_id: &str,
        now: i64,
        lease_until: i64,
    ) -> StorageResult<Option<QueueItem>>;

    /// Reverts every `in_progress` job whose lease expired before `now`
    ///
    /// # Returns
    ///
    /// The number of jobs returned to `pending`
    fn release_expired(&mut self, now: i64) -> StorageResult<u64>;

    /// Marks a job `done` and clears its lease
    fn mark_done(&mut self, url_norm: &str, now: i64) -> StorageResult<()>;

    /// Returns a job to `pending`, eligible again at `next_fetch_at`
    fn mark_retry(
        &mut self,
        url_norm: &str,
        attempts: u32,
        error: &str,
        next_fetch_at: i64,
        now: i64,
    ) -> StorageResult<()>;

    /// Freezes a job in terminal `error`
    fn mark_error(
        &mut self,
        url_norm: &str,
        attempts: u32,
        error: &str,
        now: i64,
    ) -> StorageResult<()>;

    /// Counts jobs by status (statuses with no jobs are omitted)
    fn count_jobs_by_status(&self) -> StorageResult<HashMap<JobStatus, u64>>;
}
