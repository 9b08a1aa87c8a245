use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Wiki-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Sum of all per-source document targets
    pub fn total_target(&self) -> u64 {
        self.sources.iter().map(|s| s.target).sum()
    }

    /// Looks up a source definition by name
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

/// Storage location configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,

    /// Table holding fetched documents
    #[serde(rename = "documents-table", default = "default_documents_table")]
    pub documents_table: String,

    /// Table holding crawl jobs
    #[serde(rename = "queue-table", default = "default_queue_table")]
    pub queue_table: String,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of concurrent workers
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-seconds", default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Pause between a worker's successive requests (milliseconds)
    #[serde(rename = "delay-ms", default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Attempts after which a job is frozen in `error`
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// How long an acquired job stays leased (seconds)
    #[serde(rename = "lease-seconds", default = "default_lease_seconds")]
    pub lease_seconds: u64,

    /// Seeding only happens while pending + in-progress jobs are below this
    #[serde(rename = "reseed-threshold", default = "default_reseed_threshold")]
    pub reseed_threshold: u64,

    /// How often the orchestrator counts documents (seconds)
    #[serde(
        rename = "poll-interval-seconds",
        default = "default_poll_interval_seconds"
    )]
    pub poll_interval_seconds: u64,

    /// How often the orchestrator reports progress (seconds)
    #[serde(
        rename = "report-interval-seconds",
        default = "default_report_interval_seconds"
    )]
    pub report_interval_seconds: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// A crawlable wiki source
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Unique source name, stored on every job and document
    pub name: String,

    /// Number of documents to collect from this source
    pub target: u64,

    /// Queue priority for seeded jobs (lower runs first)
    #[serde(default = "default_priority")]
    pub priority: i64,

    /// Hosts whose links may be followed (exact or `*.suffix`)
    #[serde(rename = "allowed-hosts")]
    pub allowed_hosts: Vec<String>,

    /// Links must start with this path to be followed
    #[serde(rename = "path-prefix", default = "default_path_prefix")]
    pub path_prefix: String,

    /// Article URLs are built as `url-base` + title
    #[serde(rename = "url-base")]
    pub url_base: String,

    /// How the queue is seeded for this source
    #[serde(default)]
    pub seed: Option<SeedConfig>,
}

impl SourceConfig {
    /// Maximum number of newly inserted jobs a seeding pass may produce
    pub fn seed_cap(&self) -> u64 {
        self.seed
            .as_ref()
            .and_then(|s| s.cap)
            .unwrap_or(self.target.saturating_mul(2))
    }
}

/// Seed strategy for a source
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    /// Listing strategy
    pub kind: SeedKind,

    /// MediaWiki API endpoint
    #[serde(rename = "api-url")]
    pub api_url: String,

    /// Categories to list, e.g. `Category:Physics`
    #[serde(default)]
    pub categories: Vec<String>,

    /// Extra query parameters passed to every listing request
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    /// Override for the number of newly inserted jobs (default 2 x target)
    #[serde(default)]
    pub cap: Option<u64>,
}

/// Supported seed listing strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SeedKind {
    #[serde(rename = "mediawiki-category")]
    MediaWikiCategory,
}

fn default_documents_table() -> String {
    "documents".to_string()
}

fn default_queue_table() -> String {
    "queue".to_string()
}

fn default_workers() -> u32 {
    7
}

fn default_timeout_seconds() -> u64 {
    20
}

fn default_delay_ms() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_lease_seconds() -> u64 {
    120
}

fn default_reseed_threshold() -> u64 {
    200
}

fn default_poll_interval_seconds() -> u64 {
    5
}

fn default_report_interval_seconds() -> u64 {
    15
}

fn default_priority() -> i64 {
    2
}

fn default_path_prefix() -> String {
    "/wiki/".to_string()
}
