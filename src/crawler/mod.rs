//! Crawler module for fetching and processing wiki pages
//!
//! This module contains the crawling pipeline, including:
//! - HTTP fetching and response classification
//! - HTML text extraction and link discovery
//! - Queue seeding from category listings
//! - The worker loop and the orchestrator that runs the pool

mod fetcher;
mod orchestrator;
mod parser;
mod seeder;
mod worker;

pub use fetcher::{build_http_client, describe_error, fetch_page, FetchedPage, ResponseClass};
pub use orchestrator::{ctrl_c_interrupt, Orchestrator, RunOptions, RunSummary, StopReason};
pub use parser::{extract_wiki_links, html_to_text};
pub use seeder::Seeder;
pub use worker::{
    content_hash, resolve_location, IdleSchedule, JobOutcome, Worker, WorkerSettings,
    DISCOVERED_LINK_PRIORITY,
};
