//! Queue behavior with several connections sharing one database file
//!
//! Each thread opens its own connection, the way each crawl worker does.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;
use wiki_harvest::queue::{unix_now, QueueManager, RateLimiter};
use wiki_harvest::storage::{DocumentRecord, SqliteStorage, Storage, TableNames};
use wiki_harvest::JobStatus;

const SOURCE: &str = "wiki";
const THREADS: usize = 8;

fn open_manager(path: &Path) -> QueueManager<SqliteStorage> {
    let storage = SqliteStorage::new(path, TableNames::default()).unwrap();
    QueueManager::new(
        storage,
        RateLimiter::new(vec![(SOURCE.to_string(), 1_000)]),
    )
}

/// Creates the database up front so every thread opens an initialized file
fn create_database(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("queue.db");
    open_manager(&path);
    path
}

#[test]
fn test_concurrent_enqueue_creates_one_job() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_database(&dir);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut manager = open_manager(&path);
                barrier.wait();
                manager
                    .enqueue(SOURCE, "https://en.wikipedia.org/wiki/Atom#History", 2)
                    .unwrap()
            })
        })
        .collect();

    let inserted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|inserted| *inserted)
        .count();
    assert_eq!(inserted, 1);

    let manager = open_manager(&path);
    let counts = manager.storage().count_jobs_by_status().unwrap();
    assert_eq!(counts.get(&JobStatus::Pending), Some(&1));
    assert!(manager
        .storage()
        .get_queue_item("https://en.wikipedia.org/wiki/Atom")
        .unwrap()
        .is_some());
}

#[test]
fn test_concurrent_acquire_never_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_database(&dir);

    let mut manager = open_manager(&path);
    for i in 0..60 {
        manager
            .enqueue(SOURCE, &format!("https://en.wikipedia.org/wiki/Page_{}", i), 2)
            .unwrap();
    }

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|n| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut manager = open_manager(&path);
                let worker = format!("worker-{}", n);
                let mut claimed = Vec::new();
                barrier.wait();
                while let Some(job) = manager.acquire(&worker, 120).unwrap() {
                    assert_eq!(job.locked_by.as_deref(), Some(worker.as_str()));
                    claimed.push(job.url_norm);
                }
                claimed
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for url in handle.join().unwrap() {
            assert!(seen.insert(url.clone()), "{} was acquired twice", url);
        }
    }
    assert_eq!(seen.len(), 60);

    let counts = manager.storage().count_jobs_by_status().unwrap();
    assert_eq!(counts.get(&JobStatus::InProgress), Some(&60));
    assert_eq!(counts.get(&JobStatus::Pending), None);
}

#[test]
fn test_single_job_goes_to_one_worker_and_completes() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_database(&dir);
    let url = "https://en.wikipedia.org/wiki/Electron";

    open_manager(&path).enqueue(SOURCE, url, 2).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|n| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut manager = open_manager(&path);
                barrier.wait();
                let job = manager.acquire(&format!("worker-{}", n), 120).unwrap()?;

                manager
                    .store_document(&DocumentRecord {
                        url_norm: job.url_norm.clone(),
                        raw_url: job.raw_url.clone(),
                        source: job.source.clone(),
                        fetched_at: 0,
                        raw_content: "<p>Electron</p>".to_string(),
                        extracted_text: "Electron".to_string(),
                        content_hash: String::new(),
                        http_status: 200,
                    })
                    .unwrap();
                manager.complete(&job.url_norm).unwrap();
                Some(job)
            })
        })
        .collect();

    let winners: Vec<_> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].url_norm, url);
    assert_eq!(winners[0].status, JobStatus::InProgress);

    let manager = open_manager(&path);
    let doc = manager.storage().get_document(url).unwrap().unwrap();
    assert_eq!(doc.http_status, 200);

    let job = manager.storage().get_queue_item(url).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.locked_by, None);
    assert_eq!(job.locked_until, 0);
}

#[test]
fn test_reclaim_only_expired_leases() {
    let dir = tempfile::tempdir().unwrap();
    let path = create_database(&dir);

    let mut manager = open_manager(&path);
    manager
        .enqueue(SOURCE, "https://en.wikipedia.org/wiki/Stale", 1)
        .unwrap();
    manager
        .enqueue(SOURCE, "https://en.wikipedia.org/wiki/Live", 2)
        .unwrap();

    // A crashed worker left this lease behind
    let sources = vec![SOURCE.to_string()];
    let stale = manager
        .storage_mut()
        .claim_next(&sources, "crashed", unix_now(), 10)
        .unwrap()
        .unwrap();
    assert_eq!(stale.url_norm, "https://en.wikipedia.org/wiki/Stale");

    let mut other = open_manager(&path);
    let live = other.acquire("worker-1", 3_600).unwrap().unwrap();
    assert_eq!(live.url_norm, "https://en.wikipedia.org/wiki/Live");

    assert_eq!(manager.reclaim_stale_leases().unwrap(), 1);

    let stale = manager
        .storage()
        .get_queue_item("https://en.wikipedia.org/wiki/Stale")
        .unwrap()
        .unwrap();
    assert_eq!(stale.status, JobStatus::Pending);
    assert_eq!(stale.locked_by, None);

    let live = manager
        .storage()
        .get_queue_item("https://en.wikipedia.org/wiki/Live")
        .unwrap()
        .unwrap();
    assert_eq!(live.status, JobStatus::InProgress);
    assert_eq!(live.locked_by.as_deref(), Some("worker-1"));
}
