//! Database schema definitions
//!
//! Table names come from configuration, so the schema is rendered per
//! database rather than kept as a single constant.

use crate::config::DatabaseConfig;

/// Names of the two tables the crawler works with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub documents: String,
    pub queue: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            documents: "documents".to_string(),
            queue: "queue".to_string(),
        }
    }
}

impl From<&DatabaseConfig> for TableNames {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            documents: config.documents_table.clone(),
            queue: config.queue_table.clone(),
        }
    }
}

/// Renders the schema for the given table names
pub fn schema_sql(tables: &TableNames) -> String {
    format!(
        r#"
-- Fetched pages, one per normalized URL
CREATE TABLE IF NOT EXISTS {docs} (
    url_norm TEXT PRIMARY KEY,
    raw_url TEXT NOT NULL,
    source TEXT NOT NULL,
    fetched_at INTEGER NOT NULL,
    raw_content TEXT NOT NULL,
    extracted_text TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    http_status INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_{docs}_source_fetched ON {docs}(source, fetched_at);

-- Crawl jobs, one per normalized URL; rows are never deleted
CREATE TABLE IF NOT EXISTS {queue} (
    url_norm TEXT PRIMARY KEY,
    raw_url TEXT NOT NULL,
    source TEXT NOT NULL,
    priority INTEGER NOT NULL,
    status TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    next_fetch_at INTEGER NOT NULL,
    locked_until INTEGER NOT NULL DEFAULT 0,
    locked_by TEXT
);

CREATE INDEX IF NOT EXISTS idx_{queue}_status_next ON {queue}(status, next_fetch_at);
CREATE INDEX IF NOT EXISTS idx_{queue}_locked_until ON {queue}(locked_until);
CREATE INDEX IF NOT EXISTS idx_{queue}_source_status_priority ON {queue}(source, status, priority);
"#,
        docs = tables.documents,
        queue = tables.queue,
    )
}

/// Initializes the database schema
pub fn initialize_schema(
    conn: &rusqlite::Connection,
    tables: &TableNames,
) -> Result<(), rusqlite::Error> {
    conn.execute_batch(&schema_sql(tables))
}
