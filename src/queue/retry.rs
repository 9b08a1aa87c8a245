//! Retry and backoff policy for failed fetch attempts
//!
//! | Failure | Backoff |
//! |---------|---------|
//! | HTTP 429, 500, 502, 503, 504 | 30 x attempts seconds |
//! | Any other status or a network error | 60 seconds |
//!
//! Once the attempt count reaches `max_retries` the job is failed instead.

/// Backoff step for transient server statuses (seconds per attempt)
pub const TRANSIENT_BACKOFF_STEP_SECONDS: u64 = 30;

/// Backoff for every other failure (seconds)
pub const FIXED_BACKOFF_SECONDS: u64 = 60;

/// What went wrong with a fetch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The server answered with a status worth retrying soon (429, 5xx)
    TransientStatus,
    /// Any other unexpected status, or no response at all
    Other,
}

impl FailureKind {
    /// Classifies a non-success, non-redirect HTTP status
    pub fn from_status(status: u16) -> Self {
        if is_transient_status(status) {
            Self::TransientStatus
        } else {
            Self::Other
        }
    }
}

/// Returns true for statuses that indicate a temporary server-side problem
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// The decision for a failed job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Return the job to the queue, eligible again after `backoff_seconds`
    Retry { attempts: u32, backoff_seconds: u64 },
    /// Freeze the job in terminal `error`
    Fail { attempts: u32 },
}

/// Decides between retrying and failing a job
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Decides what happens after one more failed attempt
    ///
    /// # Arguments
    ///
    /// * `previous_attempts` - The job's attempt count before this failure
    /// * `kind` - How the attempt failed
    pub fn decide(&self, previous_attempts: u32, kind: FailureKind) -> Disposition {
        let attempts = previous_attempts.saturating_add(1);

        if attempts >= self.max_retries {
            return Disposition::Fail { attempts };
        }

        let backoff_seconds = match kind {
            FailureKind::TransientStatus => TRANSIENT_BACKOFF_STEP_SECONDS * u64::from(attempts),
            FailureKind::Other => FIXED_BACKOFF_SECONDS,
        };

        Disposition::Retry {
            attempts,
            backoff_seconds,
        }
    }
}
