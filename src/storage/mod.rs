//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler:
//! - SQLite database initialization and schema management
//! - The document store (one row per fetched page)
//! - The job queue (one row per normalized URL, with status and lease fields)
//!
//! Every mutation is a single SQL statement, so concurrent workers holding
//! their own connections never observe a half-applied change.

mod schema;
mod sqlite;
mod traits;

pub use schema::TableNames;
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::JobStatus;

/// A fetched page in the document store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    /// Normalized URL, the document's identity
    pub url_norm: String,
    /// URL as it was requested
    pub raw_url: String,
    /// Name of the source this page was collected for
    pub source: String,
    /// Unix seconds
    pub fetched_at: i64,
    pub raw_content: String,
    pub extracted_text: String,
    /// SHA-256 of `raw_content`, hex encoded. Stored for change detection only.
    pub content_hash: String,
    pub http_status: u16,
}

/// A crawl job in the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// Normalized URL, the job's identity
    pub url_norm: String,
    pub raw_url: String,
    pub source: String,
    /// Lower values are acquired first
    pub priority: i64,
    pub status: JobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    /// The job may not be acquired before this time
    pub next_fetch_at: i64,
    /// Lease expiry; 0 when not leased
    pub locked_until: i64,
    pub locked_by: Option<String>,
}

/// Parameters for inserting a new pending job
#[derive(Debug, Clone, Copy)]
pub struct NewJob<'a> {
    pub url_norm: &'a str,
    pub raw_url: &'a str,
    pub source: &'a str,
    pub priority: i64,
}

/// Opens (or creates) the database described by the configuration
pub fn open_storage(config: &crate::config::DatabaseConfig) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(std::path::Path::new(&config.path), TableNames::from(config))
}
