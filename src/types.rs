//! Core types for gitdig

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of item in a remote directory listing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file with downloadable content
    File,
    /// Subdirectory
    Dir,
    /// Symlinks, submodules and anything else the API may report
    #[serde(other)]
    Other,
}

/// One item of a remote directory listing
///
/// Field names follow the contents API response so listings deserialize
/// directly into this type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Base name of the entry
    pub name: String,

    /// Full path from the repository root
    pub path: String,

    /// File, directory, or other
    #[serde(rename = "type")]
    pub kind: EntryKind,

    /// Raw content URL (present for files)
    #[serde(default)]
    pub download_url: Option<String>,

    /// Size reported by the server (0 for directories)
    #[serde(default)]
    pub size: u64,
}

impl Entry {
    /// Build a file entry
    pub fn file(path: &str, download_url: &str, size: u64) -> Self {
        Self {
            name: base_name(path).to_string(),
            path: path.to_string(),
            kind: EntryKind::File,
            download_url: Some(download_url.to_string()),
            size,
        }
    }

    /// Build a directory entry
    pub fn dir(path: &str) -> Self {
        Self {
            name: base_name(path).to_string(),
            path: path.to_string(),
            kind: EntryKind::Dir,
            download_url: None,
            size: 0,
        }
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// A repository directory to mirror, and where to put it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTarget {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Branch, tag, or commit passed as `ref` ("" = the repository's default branch)
    pub branch: String,
    /// Directory path inside the repository ("" = repository root)
    pub path: String,
    /// Local directory (or archive file) receiving the mirror
    pub local_dir: PathBuf,
}

impl std::fmt::Display for DownloadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)?;
        if !self.branch.is_empty() {
            write!(f, "@{}", self.branch)?;
        }
        if !self.path.is_empty() {
            write!(f, ":{}", self.path)?;
        }
        Ok(())
    }
}

/// Repository summary returned by the user/org repository listings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Repository name
    pub name: String,
    /// `owner/name`
    pub full_name: String,
    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,
    /// Browser URL
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Events emitted while a mirror run progresses
///
/// Subscribe with [`Mirror::subscribe`](crate::Mirror::subscribe). Events are
/// informational; dropping the receiver never affects the run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A directory listing succeeded
    DirectoryListed {
        /// Remote directory path
        path: String,
        /// Number of entries in the listing
        entries: usize,
    },

    /// A file was fetched and persisted
    FileDownloaded {
        /// Remote file path
        path: String,
        /// Bytes written
        bytes: u64,
    },

    /// Update mode found a local copy of matching size
    FileSkipped {
        /// Remote file path
        path: String,
    },

    /// A file exhausted its retries
    FileFailed {
        /// Remote file path
        path: String,
        /// Last error observed
        error: String,
    },

    /// A file transfer failed and will be attempted again
    Retrying {
        /// Remote file path
        path: String,
        /// Retry number, starting at 1
        attempt: u32,
        /// Delay before the retry, in milliseconds
        delay_ms: u64,
    },

    /// A subdirectory could not be listed; its subtree was skipped
    SubtreeFailed {
        /// Remote directory path
        path: String,
        /// Error text
        error: String,
    },

    /// A listing call hit the rate limit and is waiting
    RateLimited {
        /// Seconds until the listing is retried
        wait_secs: u64,
    },
}
