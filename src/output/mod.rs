//! Output module for progress reports and exports
//!
//! This module handles:
//! - Loading document and queue statistics from the store
//! - Formatting periodic progress reports
//! - Exporting the collected text as a plain corpus file

mod corpus;
pub mod stats;

pub use corpus::{export_corpus, write_corpus};
pub use stats::{
    docs_per_hour, load_source_progress, load_statistics, log_progress, print_statistics,
    CrawlStatistics, SourceProgress,
};
