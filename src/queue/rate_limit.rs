//! Per-source document ceilings
//!
//! The check reads document counts and the claim happens afterwards in a
//! separate statement, so concurrent workers can overshoot a cap by a few
//! documents. The targets are approximate.

use crate::config::SourceConfig;
use crate::storage::{Storage, StorageResult};

/// Tracks the document cap for every source
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    caps: Vec<(String, u64)>,
}

impl RateLimiter {
    /// Creates a limiter from `(source, cap)` pairs
    pub fn new(caps: Vec<(String, u64)>) -> Self {
        Self { caps }
    }

    /// Uses each source's target as its cap
    pub fn from_sources(sources: &[SourceConfig]) -> Self {
        Self::new(
            sources
                .iter()
                .map(|s| (s.name.clone(), s.target))
                .collect(),
        )
    }

    /// Names of all tracked sources
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.caps.iter().map(|(name, _)| name.as_str())
    }

    /// Cap for a source, if it is tracked
    pub fn cap(&self, source: &str) -> Option<u64> {
        self.caps
            .iter()
            .find(|(name, _)| name == source)
            .map(|(_, cap)| *cap)
    }

    /// Sum of all caps
    pub fn total_cap(&self) -> u64 {
        self.caps.iter().map(|(_, cap)| cap).sum()
    }

    /// Returns the sources whose document count is still below their cap
    pub fn eligible_sources<S: Storage + ?Sized>(&self, storage: &S) -> StorageResult<Vec<String>> {
        let mut eligible = Vec::with_capacity(self.caps.len());
        for (name, cap) in &self.caps {
            if storage.count_documents_for_source(name)? < *cap {
                eligible.push(name.clone());
            }
        }
        Ok(eligible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DocumentRecord, SqliteStorage};

    fn store_documents(storage: &mut SqliteStorage, source: &str, count: usize) {
        for i in 0..count {
            let url = format!("https://{}/wiki/Page_{}", source, i);
            storage
                .upsert_document(&DocumentRecord {
                    url_norm: url.clone(),
                    raw_url: url,
                    source: source.to_string(),
                    fetched_at: 0,
                    raw_content: String::new(),
                    extracted_text: String::new(),
                    content_hash: String::new(),
                    http_status: 200,
                })
                .unwrap();
        }
    }

    #[test]
    fn test_all_sources_eligible_when_empty() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let limiter = RateLimiter::new(vec![("a".to_string(), 2), ("b".to_string(), 1)]);

        assert_eq!(limiter.eligible_sources(&storage).unwrap(), vec!["a", "b"]);
        assert_eq!(limiter.total_cap(), 3);
    }

    #[test]
    fn test_source_at_cap_is_excluded() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let limiter = RateLimiter::new(vec![("a".to_string(), 2), ("b".to_string(), 1)]);

        store_documents(&mut storage, "a", 1);
        store_documents(&mut storage, "b", 1);
        assert_eq!(limiter.eligible_sources(&storage).unwrap(), vec!["a"]);

        store_documents(&mut storage, "a", 2);
        assert!(limiter.eligible_sources(&storage).unwrap().is_empty());
    }

    #[test]
    fn test_cap_lookup() {
        let limiter = RateLimiter::new(vec![("a".to_string(), 5)]);
        assert_eq!(limiter.cap("a"), Some(5));
        assert_eq!(limiter.cap("missing"), None);
        assert_eq!(limiter.sources().collect::<Vec<_>>(), vec!["a"]);
    }
}
