//! Run statistics shared between the traversal and the file workers
//!
//! Counters live in separate atomics and are only reachable through the
//! increment and [`Stats::snapshot`] methods, so no caller can observe or
//! mutate a counter without synchronization.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for one mirror run
#[derive(Debug, Default)]
pub struct Stats {
    dirs: AtomicU64,
    files: AtomicU64,
    failures: AtomicU64,
    bytes: AtomicU64,
    discovered: AtomicU64,
    skipped: AtomicU64,
}

impl Stats {
    /// Fresh counters, all zero
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory listing was attempted
    pub fn record_dir(&self) {
        self.dirs.fetch_add(1, Ordering::AcqRel);
    }

    /// A file entry was found in a listing
    pub fn record_discovered(&self) {
        self.discovered.fetch_add(1, Ordering::AcqRel);
    }

    /// A file was transferred successfully
    pub fn record_file(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::AcqRel);
        self.files.fetch_add(1, Ordering::AcqRel);
    }

    /// A file exhausted its retries
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::AcqRel);
    }

    /// Update mode found an up-to-date local copy
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::AcqRel);
    }

    /// Current failure count
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Acquire)
    }

    /// Point-in-time copy of every counter
    ///
    /// `discovered` is read last so that `files + failures + skipped` never
    /// exceeds it in the returned value.
    pub fn snapshot(&self) -> StatsSnapshot {
        let dirs = self.dirs.load(Ordering::Acquire);
        let files = self.files.load(Ordering::Acquire);
        let failures = self.failures.load(Ordering::Acquire);
        let bytes = self.bytes.load(Ordering::Acquire);
        let skipped = self.skipped.load(Ordering::Acquire);
        let discovered = self.discovered.load(Ordering::Acquire);
        StatsSnapshot {
            dirs,
            files,
            failures,
            bytes,
            discovered,
            skipped,
        }
    }
}

/// Plain copy of [`Stats`] taken at one instant
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Directories visited (root included)
    pub dirs: u64,
    /// Files transferred successfully
    pub files: u64,
    /// Files that exhausted their retries
    pub failures: u64,
    /// Total bytes written
    pub bytes: u64,
    /// File entries seen in listings
    pub discovered: u64,
    /// Files skipped by update mode
    pub skipped: u64,
}

impl StatsSnapshot {
    /// Bytes expressed in MiB, for summaries
    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / (1024.0 * 1024.0)
    }
}
