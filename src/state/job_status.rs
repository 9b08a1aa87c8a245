/// Job status definitions for the crawl queue
///
/// Lifecycle: `Pending -> InProgress -> {Done | Pending (backoff) | Error}`.
/// An expired lease also moves `InProgress` back to `Pending`.
use std::fmt;

/// Represents the current state of a job in the crawl queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobStatus {
    /// Waiting to be acquired once `next_fetch_at` has passed
    Pending,

    /// Leased by a worker until `locked_until`
    InProgress,

    /// Fetched (or resolved as a redirect) successfully
    Done,

    /// Attempts exhausted; never retried automatically
    Error,
}

impl JobStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::InProgress,
        JobStatus::Done,
        JobStatus::Error,
    ];

    /// Returns true if no further processing will happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Returns true if the job still occupies the queue (pending or leased)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn test_active_and_terminal_are_exclusive() {
        for status in JobStatus::ALL {
            assert_ne!(status.is_active(), status.is_terminal(), "{}", status);
        }
    }

    #[test]
    fn test_db_string_roundtrip() {
        for status in JobStatus::ALL {
            assert_eq!(JobStatus::from_db_string(status.to_db_string()), Some(status));
        }
    }

    #[test]
    fn test_unknown_db_string() {
        assert_eq!(JobStatus::from_db_string("fetching"), None);
        assert_eq!(JobStatus::from_db_string(""), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(JobStatus::InProgress.to_string(), "in_progress");
    }
}
