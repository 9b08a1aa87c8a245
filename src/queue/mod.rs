//! Queue management for crawl jobs
//!
//! This module sits between the workers and the storage backend:
//! - [`QueueManager`] exposes the job lifecycle operations
//!   (enqueue, acquire, complete, retry, fail, reclaim)
//! - [`RateLimiter`] decides which sources may still hand out jobs
//! - [`RetryPolicy`] turns a failed attempt into a retry or a terminal error

mod manager;
mod rate_limit;
mod retry;

pub use manager::{unix_now, QueueManager};
pub use rate_limit::RateLimiter;
pub use retry::{
    is_transient_status, Disposition, FailureKind, RetryPolicy, FIXED_BACKOFF_SECONDS,
    TRANSIENT_BACKOFF_STEP_SECONDS,
};
