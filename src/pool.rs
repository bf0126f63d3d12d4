//! Bounded worker pool for file transfers
//!
//! Submitting work first acquires one of `capacity` semaphore permits; the
//! permit is moved into the spawned task and released when the task ends,
//! whatever its outcome. When every permit is taken, [`WorkerPool::submit`]
//! waits, which stalls the caller (the traversal) until a slot frees up.

use crate::error::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Fixed-capacity set of concurrently running tasks
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
    capacity: usize,
}

impl WorkerPool {
    /// Create a pool running at most `capacity` tasks at once
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            tasks: JoinSet::new(),
            capacity,
        }
    }

    /// Maximum number of simultaneous tasks
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tasks currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    /// Spawn `task` once a slot is free, waiting for one if necessary
    pub async fn submit<F>(&mut self, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| Error::Other(format!("worker pool closed: {e}")))?;

        self.reap_finished();

        self.tasks.spawn(async move {
            let _permit = permit;
            task.await;
        });
        Ok(())
    }

    /// Wait for every submitted task to finish
    pub async fn join(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            log_join_error(result);
        }
    }

    fn reap_finished(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            log_join_error(result);
        }
    }
}

fn log_join_error(result: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!(error = %e, "file worker panicked");
        } else {
            tracing::warn!(error = %e, "file worker was cancelled");
        }
    }
}
