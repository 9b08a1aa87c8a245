//! State module for tracking crawl progress
//!
//! Every job in the queue carries a [`JobStatus`]; the queue manager is the
//! only component that moves a job between statuses.

mod job_status;

pub use job_status::JobStatus;
