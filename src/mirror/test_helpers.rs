//! Shared test helpers: an in-memory content source and config builders.

use crate::config::{Config, RetryConfig};
use crate::error::{Error, Result};
use crate::github::ContentSource;
use crate::types::{DownloadTarget, Entry};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory remote tree
///
/// Listings are keyed by directory path ("" = root), content by URL. Fetches
/// can be made to fail a fixed number of times, and every fetch sleeps a
/// little while holding the concurrency gauge so overlap is observable.
#[derive(Default)]
pub(crate) struct FakeSource {
    listings: HashMap<String, Vec<Entry>>,
    contents: HashMap<String, Vec<u8>>,
    broken_dirs: HashSet<String>,
    fail_counts: Mutex<HashMap<String, u32>>,
    fetch_delay: Duration,
    fetches: AtomicUsize,
    lists: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self {
            fetch_delay: Duration::from_millis(5),
            ..Default::default()
        }
    }

    /// Add a directory listing
    pub(crate) fn dir(mut self, path: &str, entries: Vec<Entry>) -> Self {
        self.listings.insert(path.to_string(), entries);
        self
    }

    /// Add file content reachable at `url`
    pub(crate) fn content(mut self, url: &str, bytes: &[u8]) -> Self {
        self.contents.insert(url.to_string(), bytes.to_vec());
        self
    }

    /// Make listing `path` fail
    pub(crate) fn broken_dir(mut self, path: &str) -> Self {
        self.broken_dirs.insert(path.to_string());
        self
    }

    /// Make the first `times` fetches of `url` fail with a retryable error
    pub(crate) fn failing(self, url: &str, times: u32) -> Self {
        self.fail_counts
            .lock()
            .unwrap()
            .insert(url.to_string(), times);
        self
    }

    pub(crate) fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    /// Highest number of fetches observed running at once
    pub(crate) fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn list_contents(&self, _target: &DownloadTarget, path: &str) -> Result<Vec<Entry>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        if self.broken_dirs.contains(path) {
            return Err(Error::Api {
                status: 500,
                body: format!("cannot list {path}"),
            });
        }
        self.listings.get(path).cloned().ok_or_else(|| Error::Api {
            status: 404,
            body: "Not Found".to_string(),
        })
    }

    async fn fetch_file(&self, url: &str) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.fetch_delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        {
            let mut fails = self.fail_counts.lock().unwrap();
            if let Some(remaining) = fails.get_mut(url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(Error::Http {
                        status: 503,
                        url: url.to_string(),
                    });
                }
            }
        }

        self.contents.get(url).cloned().ok_or_else(|| Error::Http {
            status: 404,
            url: url.to_string(),
        })
    }
}

/// The reference tree used across engine tests:
///
/// ```text
/// a.txt           (10 bytes)
/// sub/b.txt       (20 bytes)
/// sub/deeper/c.txt (5 bytes)
/// ```
pub(crate) fn sample_source() -> FakeSource {
    FakeSource::new()
        .dir(
            "",
            vec![Entry::file("a.txt", "mem://a", 10), Entry::dir("sub")],
        )
        .dir(
            "sub",
            vec![
                Entry::file("sub/b.txt", "mem://b", 20),
                Entry::dir("sub/deeper"),
            ],
        )
        .dir(
            "sub/deeper",
            vec![Entry::file("sub/deeper/c.txt", "mem://c", 5)],
        )
        .content("mem://a", b"aaaaaaaaaa")
        .content("mem://b", b"bbbbbbbbbbbbbbbbbbbb")
        .content("mem://c", b"ccccc")
}

/// Config with fast retries so failure tests stay quick
pub(crate) fn test_config() -> Config {
    Config {
        retry: RetryConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            ..RetryConfig::default()
        },
        ..Config::default()
    }
}

/// Target rooted at the repository root, written into `local_dir`
pub(crate) fn target_in(local_dir: &std::path::Path) -> DownloadTarget {
    DownloadTarget {
        owner: "octo".to_string(),
        repo: "hello".to_string(),
        branch: String::new(),
        path: String::new(),
        local_dir: local_dir.to_path_buf(),
    }
}
