//! Read-only listing of a target with a tree rendering

use super::walk::SubtreeWarning;
use crate::config::Config;
use crate::error::Result;
use crate::github::ContentSource;
use crate::stats::{Stats, StatsSnapshot};
use crate::types::{DownloadTarget, Entry, EntryKind};
use futures::future::{BoxFuture, FutureExt};
use std::fmt::Write as _;

/// What a run would transfer, without transferring anything
#[derive(Clone, Debug)]
pub struct PreviewReport {
    /// Counts as a real run would record them (files counted as downloaded)
    pub stats: StatsSnapshot,
    /// Rendered tree, one entry per line
    pub tree: String,
    /// Subtrees that could not be listed
    pub warnings: Vec<SubtreeWarning>,
}

impl PreviewReport {
    /// Footer line with totals
    pub fn summary(&self) -> String {
        format!(
            "Total: {} files, {} directories, {}",
            self.stats.files,
            self.stats.dirs,
            format_size(self.stats.bytes)
        )
    }
}

/// Human-readable byte count: `512 B`, `1.5 KB`, `2.00 MB`, `1.00 GB`
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GB", b / GB)
    } else if b >= MB {
        format!("{:.2} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

struct TreeBuilder<'a> {
    source: &'a dyn ContentSource,
    target: &'a DownloadTarget,
    recursive: bool,
    stats: Stats,
    tree: String,
    warnings: Vec<SubtreeWarning>,
}

impl<'a> TreeBuilder<'a> {
    fn render_entries(&mut self, entries: Vec<Entry>, prefix: String) -> BoxFuture<'_, ()> {
        async move {
            let count = entries.len();
            for (i, entry) in entries.into_iter().enumerate() {
                let last = i + 1 == count;
                let connector = if last { "└── " } else { "├── " };
                match entry.kind {
                    EntryKind::File => {
                        self.stats.record_discovered();
                        self.stats.record_file(entry.size);
                        let _ = writeln!(
                            self.tree,
                            "{prefix}{connector}{} ({})",
                            entry.name,
                            format_size(entry.size)
                        );
                    }
                    EntryKind::Dir => {
                        let _ = writeln!(self.tree, "{prefix}{connector}{}/", entry.name);
                        if !self.recursive {
                            continue;
                        }
                        self.stats.record_dir();
                        let child_prefix =
                            format!("{prefix}{}", if last { "    " } else { "│   " });
                        match self.source.list_contents(self.target, &entry.path).await {
                            Ok(children) => self.render_entries(children, child_prefix).await,
                            Err(e) => {
                                tracing::warn!(path = %entry.path, error = %e, "skipping subtree");
                                let _ = writeln!(self.tree, "{child_prefix}(unavailable: {e})");
                                self.warnings.push(SubtreeWarning {
                                    path: entry.path,
                                    error: e.to_string(),
                                });
                            }
                        }
                    }
                    EntryKind::Other => {}
                }
            }
        }
        .boxed()
    }
}

/// List `target` sequentially and render it as a tree
///
/// No file content is fetched and nothing is written. Failing to list the
/// root is an error; deeper failures are reported as warnings.
pub(crate) async fn preview(
    source: &dyn ContentSource,
    config: &Config,
    target: &DownloadTarget,
) -> Result<PreviewReport> {
    let entries = source.list_contents(target, &target.path).await?;

    let mut builder = TreeBuilder {
        source,
        target,
        recursive: config.recursive,
        stats: Stats::new(),
        tree: String::new(),
        warnings: Vec::new(),
    };
    builder.stats.record_dir();
    let _ = writeln!(builder.tree, "{target}");
    builder.render_entries(entries, String::new()).await;

    Ok(PreviewReport {
        stats: builder.stats.snapshot(),
        tree: builder.tree,
        warnings: builder.warnings,
    })
}
