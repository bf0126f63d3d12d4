//! Depth-first traversal and per-file transfer tasks

use super::RunContext;
use crate::error::{Error, Result};
use crate::pool::WorkerPool;
use crate::retry::download_with_retry_notify;
use crate::types::{Entry, EntryKind, Event};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A subtree that was skipped because it could not be listed or created
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtreeWarning {
    /// Remote directory path
    pub path: String,
    /// Error text
    pub error: String,
}

/// Partial result of a traversal: everything that did not abort the run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WalkOutcome {
    /// Subtrees skipped, in traversal order
    pub warnings: Vec<SubtreeWarning>,
}

impl WalkOutcome {
    fn skip_subtree(&mut self, ctx: &RunContext, path: &str, error: &Error) {
        tracing::warn!(path, error = %error, "skipping subtree");
        ctx.emit(Event::SubtreeFailed {
            path: path.to_string(),
            error: error.to_string(),
        });
        self.warnings.push(SubtreeWarning {
            path: path.to_string(),
            error: error.to_string(),
        });
    }
}

/// Path of `entry` relative to the mirror root `root`
///
/// When the root itself names a file, the entry's own name is used.
pub(crate) fn relative_path(root: &str, entry: &Entry) -> String {
    let root = root.trim_matches('/');
    let path = entry.path.trim_matches('/');
    if root.is_empty() {
        return path.to_string();
    }
    match path.strip_prefix(root) {
        Some("") => entry.name.clone(),
        Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/').to_string(),
        _ => path.to_string(),
    }
}

/// Walk the target tree, dispatching file transfers into `pool`
///
/// Returns once every listing has been made and every file submitted; the
/// caller joins the pool. Failing to list the root is fatal.
pub(crate) async fn walk(ctx: &Arc<RunContext>, pool: &mut WorkerPool) -> Result<WalkOutcome> {
    let root = ctx.target.path.clone();
    ctx.stats.record_dir();
    let entries = ctx.source.list_contents(&ctx.target, &root).await?;
    ctx.emit(Event::DirectoryListed {
        path: root.clone(),
        entries: entries.len(),
    });

    let mut outcome = WalkOutcome::default();
    dispatch_entries(ctx, pool, entries, &mut outcome).await?;
    Ok(outcome)
}

/// List one subdirectory and dispatch its entries; listing failures only
/// skip this subtree
fn walk_dir<'a>(
    ctx: &'a Arc<RunContext>,
    pool: &'a mut WorkerPool,
    path: String,
    outcome: &'a mut WalkOutcome,
) -> BoxFuture<'a, Result<()>> {
    async move {
        ctx.stats.record_dir();
        let entries = match ctx.source.list_contents(&ctx.target, &path).await {
            Ok(entries) => entries,
            Err(e) => {
                outcome.skip_subtree(ctx, &path, &e);
                return Ok(());
            }
        };
        ctx.emit(Event::DirectoryListed {
            path: path.clone(),
            entries: entries.len(),
        });
        dispatch_entries(ctx, pool, entries, outcome).await
    }
    .boxed()
}

/// Submit files to the pool and descend into directories, in listing order
///
/// A directory's container is created before anything inside it is
/// dispatched, and its whole subtree is walked before the next sibling.
async fn dispatch_entries(
    ctx: &Arc<RunContext>,
    pool: &mut WorkerPool,
    entries: Vec<Entry>,
    outcome: &mut WalkOutcome,
) -> Result<()> {
    for entry in entries {
        match entry.kind {
            EntryKind::File => {
                ctx.stats.record_discovered();
                let rel = relative_path(&ctx.target.path, &entry);
                let task_ctx = ctx.clone();
                pool.submit(transfer_file(task_ctx, entry, rel)).await?;
            }
            EntryKind::Dir => {
                if !ctx.config.recursive {
                    continue;
                }
                let rel = relative_path(&ctx.target.path, &entry);
                if let Err(e) = ctx.sink.create_container(&rel).await {
                    outcome.skip_subtree(ctx, &entry.path, &e);
                    continue;
                }
                walk_dir(ctx, pool, entry.path, outcome).await?;
            }
            EntryKind::Other => {
                tracing::debug!(path = %entry.path, "skipping non-file entry");
            }
        }
    }
    Ok(())
}

/// Transfer one file: update check, then fetch-and-persist under retry
async fn transfer_file(ctx: Arc<RunContext>, entry: Entry, rel: String) {
    let verbose = ctx.config.verbose;

    let Some(url) = entry.download_url.clone() else {
        let error = "entry has no download URL".to_string();
        tracing::error!(path = %entry.path, error, "failed");
        ctx.stats.record_failure();
        ctx.emit(Event::FileFailed {
            path: entry.path,
            error,
        });
        return;
    };

    if ctx.config.update {
        if let Some(existing) = ctx.sink.existing_size(&rel).await {
            if existing > 0 && existing == entry.size {
                tracing::debug!(path = %entry.path, size = existing, "up to date, skipping");
                ctx.stats.record_skipped();
                ctx.emit(Event::FileSkipped { path: entry.path });
                return;
            }
        }
    }

    let result = download_with_retry_notify(
        &ctx.config.retry,
        || {
            let ctx = ctx.clone();
            let url = url.clone();
            let rel = rel.clone();
            async move {
                let bytes = ctx.source.fetch_file(&url).await?;
                ctx.sink.write_entry(&rel, &bytes).await?;
                Ok::<u64, Error>(bytes.len() as u64)
            }
        },
        |attempt, delay, _error| {
            ctx.emit(Event::Retrying {
                path: entry.path.clone(),
                attempt,
                delay_ms: delay.as_millis() as u64,
            });
        },
    )
    .await;

    match result {
        Ok(bytes) => {
            ctx.stats.record_file(bytes);
            if verbose {
                tracing::info!(
                    path = %entry.path,
                    kb = bytes as f64 / 1024.0,
                    "downloaded"
                );
            } else {
                tracing::debug!(path = %entry.path, bytes, "downloaded");
            }
            ctx.emit(Event::FileDownloaded {
                path: entry.path,
                bytes,
            });
        }
        Err(e) => {
            tracing::error!(path = %entry.path, error = %e, "failed");
            ctx.stats.record_failure();
            ctx.emit(Event::FileFailed {
                path: entry.path,
                error: e.to_string(),
            });
        }
    }
}
