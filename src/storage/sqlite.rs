//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! Each worker opens its own `SqliteStorage`; WAL mode plus a busy timeout
//! lets the connections share one database file, with SQLite's write lock
//! serializing the single-statement mutations.

use crate::state::JobStatus;
use crate::storage::schema::{initialize_schema, TableNames};
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{DocumentRecord, NewJob, QueueItem};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// How long a statement waits for another connection's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const QUEUE_COLUMNS: &str = "url_norm, raw_url, source, priority, status, attempts, last_error, \
     created_at, updated_at, next_fetch_at, locked_until, locked_by";

const DOCUMENT_COLUMNS: &str =
    "url_norm, raw_url, source, fetched_at, raw_content, extracted_text, content_hash, http_status";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
    tables: TableNames,
}

impl SqliteStorage {
    /// Opens or creates the database file and ensures the schema exists
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `tables` - Names of the document and queue tables
    pub fn new(path: &Path, tables: TableNames) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn, &tables)?;

        Ok(Self { conn, tables })
    }

    /// Creates a private in-memory database
    ///
    /// Only one connection can see an in-memory database, so this is meant
    /// for single-worker tests.
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        let tables = TableNames::default();
        initialize_schema(&conn, &tables)?;
        Ok(Self { conn, tables })
    }

    /// Names of the tables this storage works on
    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    fn expect_one_row(&self, changed: usize, url_norm: &str) -> StorageResult<()> {
        if changed == 0 {
            return Err(StorageError::NotFound(url_norm.to_string()));
        }
        Ok(())
    }
}

fn row_to_queue_item(row: &Row<'_>) -> rusqlite::Result<QueueItem> {
    let status_str: String = row.get(4)?;
    let status = JobStatus::from_db_string(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            format!("unknown job status '{}'", status_str).into(),
        )
    })?;

    Ok(QueueItem {
        url_norm: row.get(0)?,
        raw_url: row.get(1)?,
        source: row.get(2)?,
        priority: row.get(3)?,
        status,
        attempts: row.get(5)?,
        last_error: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        next_fetch_at: row.get(9)?,
        locked_until: row.get(10)?,
        locked_by: row.get(11)?,
    })
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        url_norm: row.get(0)?,
        raw_url: row.get(1)?,
        source: row.get(2)?,
        fetched_at: row.get(3)?,
        raw_content: row.get(4)?,
        extracted_text: row.get(5)?,
        content_hash: row.get(6)?,
        http_status: row.get(7)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Document Store =====

    fn document_exists(&self, url_norm: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                &format!(
                    "SELECT 1 FROM {} WHERE url_norm = ?1",
                    self.tables.documents
                ),
                params![url_norm],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn get_document(&self, url_norm: &str) -> StorageResult<Option<DocumentRecord>> {
        let doc = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE url_norm = ?1",
                    DOCUMENT_COLUMNS, self.tables.documents
                ),
                params![url_norm],
                row_to_document,
            )
            .optional()?;
        Ok(doc)
    }

    fn upsert_document(&mut self, doc: &DocumentRecord) -> StorageResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(url_norm) DO UPDATE SET
                    raw_url = excluded.raw_url,
                    source = excluded.source,
                    fetched_at = excluded.fetched_at,
                    raw_content = excluded.raw_content,
                    extracted_text = excluded.extracted_text,
                    content_hash = excluded.content_hash,
                    http_status = excluded.http_status",
                self.tables.documents, DOCUMENT_COLUMNS
            ),
            params![
                doc.url_norm,
                doc.raw_url,
                doc.source,
                doc.fetched_at,
                doc.raw_content,
                doc.extracted_text,
                doc.content_hash,
                doc.http_status,
            ],
        )?;
        Ok(())
    }

    fn count_documents_for_source(&self, source: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE source = ?1",
                self.tables.documents
            ),
            params![source],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_documents(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.tables.documents),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn visit_documents(
        &self,
        visit: &mut dyn FnMut(DocumentRecord) -> StorageResult<()>,
    ) -> StorageResult<u64> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY rowid ASC",
            DOCUMENT_COLUMNS, self.tables.documents
        ))?;

        let mut rows = stmt.query([])?;
        let mut visited = 0;
        while let Some(row) = rows.next()? {
            visit(row_to_document(row)?)?;
            visited += 1;
        }

        Ok(visited)
    }

    // ===== Job Queue =====

    fn get_queue_item(&self, url_norm: &str) -> StorageResult<Option<QueueItem>> {
        let item = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE url_norm = ?1",
                    QUEUE_COLUMNS, self.tables.queue
                ),
                params![url_norm],
                row_to_queue_item,
            )
            .optional()?;
        Ok(item)
    }

    fn insert_pending(&mut self, job: NewJob<'_>, now: i64) -> StorageResult<bool> {
        // The WHERE clause also keeps the upsert syntax unambiguous.
        let inserted = self.conn.execute(
            &format!(
                "INSERT INTO {queue} ({columns})
                 SELECT ?1, ?2, ?3, ?4, ?5, 0, NULL, ?6, ?6, ?6, 0, NULL
                 WHERE NOT EXISTS (SELECT 1 FROM {docs} WHERE url_norm = ?1)
                 ON CONFLICT(url_norm) DO NOTHING",
                queue = self.tables.queue,
                docs = self.tables.documents,
                columns = QUEUE_COLUMNS,
            ),
            params![
                job.url_norm,
                job.raw_url,
                job.source,
                job.priority,
                JobStatus::Pending.to_db_string(),
                now,
            ],
        )?;
        Ok(inserted == 1)
    }

    fn claim_next(
        &mut self,
        sources: &[String],
        worker_id: &str,
        now: i64,
        lease_until: i64,
    ) -> StorageResult<Option<QueueItem>> {
        if sources.is_empty() {
            return Ok(None);
        }

        let placeholders = (0..sources.len())
            .map(|i| format!("?{}", i + 4))
            .collect::<Vec<_>>()
            .join(", ");

        // One statement: the row is re-checked as pending when it is updated,
        // so a job can only be handed out once.
        let sql = format!(
            "UPDATE {queue}
             SET status = '{in_progress}', locked_by = ?1, locked_until = ?2, updated_at = ?3
             WHERE url_norm = (
                 SELECT url_norm FROM {queue}
                 WHERE status = '{pending}'
                   AND next_fetch_at <= ?3
                   AND source IN ({placeholders})
                 ORDER BY priority ASC, next_fetch_at ASC, created_at ASC, rowid ASC
                 LIMIT 1
             )
             AND status = '{pending}'
             RETURNING {columns}",
            queue = self.tables.queue,
            in_progress = JobStatus::InProgress.to_db_string(),
            pending = JobStatus::Pending.to_db_string(),
            placeholders = placeholders,
            columns = QUEUE_COLUMNS,
        );

        let mut values: Vec<&dyn ToSql> = vec![&worker_id, &lease_until, &now];
        values.extend(sources.iter().map(|s| s as &dyn ToSql));

        let item = self
            .conn
            .query_row(&sql, params_from_iter(values), row_to_queue_item)
            .optional()?;
        Ok(item)
    }

    fn release_expired(&mut self, now: i64) -> StorageResult<u64> {
        let released = self.conn.execute(
            &format!(
                "UPDATE {} SET status = ?1, locked_by = NULL, locked_until = 0, updated_at = ?2
                 WHERE status = ?3 AND locked_until < ?2",
                self.tables.queue
            ),
            params![
                JobStatus::Pending.to_db_string(),
                now,
                JobStatus::InProgress.to_db_string(),
            ],
        )?;
        Ok(released as u64)
    }

    fn mark_done(&mut self, url_norm: &str, now: i64) -> StorageResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET status = ?1, locked_by = NULL, locked_until = 0, updated_at = ?2
                 WHERE url_norm = ?3",
                self.tables.queue
            ),
            params![JobStatus::Done.to_db_string(), now, url_norm],
        )?;
        self.expect_one_row(changed, url_norm)
    }

    fn mark_retry(
        &mut self,
        url_norm: &str,
        attempts: u32,
        error: &str,
        next_fetch_at: i64,
        now: i64,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET status = ?1, attempts = ?2, last_error = ?3, next_fetch_at = ?4,
                    locked_by = NULL, locked_until = 0, updated_at = ?5
                 WHERE url_norm = ?6",
                self.tables.queue
            ),
            params![
                JobStatus::Pending.to_db_string(),
                attempts,
                error,
                next_fetch_at,
                now,
                url_norm
            ],
        )?;
        self.expect_one_row(changed, url_norm)
    }

    fn mark_error(
        &mut self,
        url_norm: &str,
        attempts: u32,
        error: &str,
        now: i64,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET status = ?1, attempts = ?2, last_error = ?3,
                    locked_by = NULL, locked_until = 0, updated_at = ?4
                 WHERE url_norm = ?5",
                self.tables.queue
            ),
            params![
                JobStatus::Error.to_db_string(),
                attempts,
                error,
                now,
                url_norm
            ],
        )?;
        self.expect_one_row(changed, url_norm)
    }

    fn count_jobs_by_status(&self) -> StorageResult<HashMap<JobStatus, u64>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT status, COUNT(*) FROM {} GROUP BY status",
            self.tables.queue
        ))?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (status_str, count) = row?;
            match JobStatus::from_db_string(&status_str) {
                Some(status) => {
                    counts.insert(status, count as u64);
                }
                None => tracing::warn!("Ignoring unknown job status '{}'", status_str),
            }
        }

        Ok(counts)
    }
}
