//! Mirror engine: traversal, file transfer, and preview
//!
//! The [`Mirror`] struct and its operations are split by concern:
//! - `walk` - depth-first traversal and per-file transfer tasks
//! - `preview` - read-only listing with a tree rendering
//!
//! A run proceeds as: open the sink (fatal on failure), walk the remote tree
//! dispatching file work into a bounded [`WorkerPool`], join the pool, close
//! the sink, and return a [`RunReport`].

mod preview;
mod walk;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use preview::{PreviewReport, format_size};
pub use walk::{SubtreeWarning, WalkOutcome};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::github::{ContentSource, GitHubClient};
use crate::pool::WorkerPool;
use crate::sink::open_sink;
use crate::stats::{Stats, StatsSnapshot};
use crate::types::{DownloadTarget, Event};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Outcome of one completed (non-preview) mirror run
#[derive(Clone, Debug)]
pub struct RunReport {
    /// What was mirrored
    pub target: DownloadTarget,
    /// Final counters, read after every worker joined
    pub stats: StatsSnapshot,
    /// Subtrees that could not be listed or created
    pub warnings: Vec<SubtreeWarning>,
    /// Wall time of the run
    pub elapsed: Duration,
}

impl RunReport {
    /// `Err(PartialFailure)` when any file exhausted its retries
    pub fn into_result(self) -> Result<RunReport> {
        if self.stats.failures > 0 {
            Err(Error::PartialFailure {
                failures: self.stats.failures,
            })
        } else {
            Ok(self)
        }
    }

    /// Multi-line human summary
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Download Summary\nTime: {:.1} seconds\nFiles: {}\nDirectories: {}\nSize: {:.2} MB\n",
            self.elapsed.as_secs_f64(),
            self.stats.files,
            self.stats.dirs,
            self.stats.megabytes(),
        );
        if self.stats.skipped > 0 {
            out.push_str(&format!("Up to date: {}\n", self.stats.skipped));
        }
        if !self.warnings.is_empty() {
            out.push_str(&format!("Skipped subtrees: {}\n", self.warnings.len()));
        }
        if self.stats.failures > 0 {
            out.push_str(&format!("Failures: {}\n", self.stats.failures));
        } else {
            out.push_str("All files downloaded successfully!\n");
        }
        out
    }
}

/// Shared state handed to the traversal and to every file task
pub(crate) struct RunContext {
    pub(crate) config: Arc<Config>,
    pub(crate) source: Arc<dyn ContentSource>,
    pub(crate) sink: Arc<dyn crate::sink::Sink>,
    pub(crate) stats: Arc<Stats>,
    pub(crate) target: DownloadTarget,
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl RunContext {
    pub(crate) fn emit(&self, event: Event) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

/// Mirrors remote repository directories (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Mirror {
    config: Arc<Config>,
    source: Arc<dyn ContentSource>,
    event_tx: broadcast::Sender<Event>,
}

impl Mirror {
    /// Build a mirror talking to the GitHub API described by `config`
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let client =
            GitHubClient::new(&config.http, config.resolve_token())?.with_event_sender(event_tx.clone());
        Ok(Self {
            config: Arc::new(config),
            source: Arc::new(client),
            event_tx,
        })
    }

    /// Build a mirror over any [`ContentSource`]
    pub fn with_source(config: Config, source: Arc<dyn ContentSource>) -> Result<Self> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            config: Arc::new(config),
            source,
            event_tx,
        })
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mirror one target into its local destination
    ///
    /// Returns once every dispatched file task has finished. Only failing to
    /// open the destination or to list the root directory is an error; file
    /// failures are counted in the report and subtree failures listed in its
    /// warnings.
    pub async fn run(&self, target: &DownloadTarget) -> Result<RunReport> {
        let start = Instant::now();
        tracing::info!(
            repo = %target,
            destination = %target.local_dir.display(),
            "starting mirror"
        );

        let sink = open_sink(self.config.output, &target.local_dir).await?;
        let ctx = Arc::new(RunContext {
            config: self.config.clone(),
            source: self.source.clone(),
            sink: sink.clone(),
            stats: Arc::new(Stats::new()),
            target: target.clone(),
            event_tx: self.event_tx.clone(),
        });

        let mut pool = WorkerPool::new(self.config.concurrency);
        let walked = walk::walk(&ctx, &mut pool).await;
        pool.join().await;
        let finished = sink.finish().await;

        let outcome = walked?;
        finished?;

        let report = RunReport {
            target: target.clone(),
            stats: ctx.stats.snapshot(),
            warnings: outcome.warnings,
            elapsed: start.elapsed(),
        };
        tracing::info!(
            repo = %target,
            files = report.stats.files,
            dirs = report.stats.dirs,
            failures = report.stats.failures,
            bytes = report.stats.bytes,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "mirror finished"
        );
        Ok(report)
    }

    /// Run (or preview) one target according to the configured mode and log
    /// its summary
    ///
    /// Unlike [`Mirror::run`], any failed file turns the result into
    /// [`Error::PartialFailure`].
    pub async fn download_target(&self, target: &DownloadTarget) -> Result<()> {
        if self.config.preview {
            let preview = self.preview(target).await?;
            tracing::info!(repo = %target, "\n{}{}", preview.tree, preview.summary());
            return Ok(());
        }

        let report = self.run(target).await?;
        tracing::info!(repo = %target, "{}", report.summary());
        report.into_result().map(|_| ())
    }

    /// List a target without downloading anything
    pub async fn preview(&self, target: &DownloadTarget) -> Result<PreviewReport> {
        preview::preview(self.source.as_ref(), &self.config, target).await
    }
}
