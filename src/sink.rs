//! Destinations for downloaded bytes
//!
//! A [`Sink`] receives container (directory) creations and file writes keyed
//! by a path relative to the mirror root, using `/` as separator.
//!
//! - [`FsSink`] mirrors the tree on disk. Distinct files never alias, so it
//!   needs no locking between workers.
//! - [`ArchiveSink`] appends records to one zip file. The writer is a single
//!   shared resource, so every call takes its mutex for the whole append,
//!   off the async worker threads.

use crate::config::OutputMode;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Where a mirror run persists what it downloads
#[async_trait]
pub trait Sink: Send + Sync {
    /// Create the container for a directory (relative path)
    async fn create_container(&self, rel_path: &str) -> Result<()>;

    /// Persist one file's bytes at a relative path
    async fn write_entry(&self, rel_path: &str, bytes: &[u8]) -> Result<()>;

    /// Size of an already persisted file, if the sink can tell
    ///
    /// Update mode relies on this; sinks that cannot answer return `None`,
    /// which always leads to a fetch.
    async fn existing_size(&self, _rel_path: &str) -> Option<u64> {
        None
    }

    /// Flush and close; called once after every worker has finished
    async fn finish(&self) -> Result<()> {
        Ok(())
    }
}

/// Open the sink for `mode` at `destination`
///
/// Failing to create the destination is fatal for the run.
pub async fn open_sink(mode: OutputMode, destination: &Path) -> Result<Arc<dyn Sink>> {
    match mode {
        OutputMode::Directory => Ok(Arc::new(FsSink::create(destination).await?)),
        OutputMode::Archive => Ok(Arc::new(ArchiveSink::create(destination).await?)),
    }
}

/// Join a `/`-separated relative path onto `root`, refusing anything that
/// would escape it
fn safe_join(root: &Path, rel_path: &str) -> Result<PathBuf> {
    let mut path = root.to_path_buf();
    for component in Path::new(rel_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("refusing unsafe path '{rel_path}'"),
                )));
            }
        }
    }
    Ok(path)
}

/// Sink mirroring the remote tree as directories and files
#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    /// Create (recursively) the root directory and return a sink over it
    pub async fn create(root: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(root).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to create output directory '{}': {}", root.display(), e),
            ))
        })?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }
}

#[async_trait]
impl Sink for FsSink {
    async fn create_container(&self, rel_path: &str) -> Result<()> {
        let dir = safe_join(&self.root, rel_path)?;
        tokio::fs::create_dir_all(&dir).await?;
        Ok(())
    }

    async fn write_entry(&self, rel_path: &str, bytes: &[u8]) -> Result<()> {
        let file_path = safe_join(&self.root, rel_path)?;
        if let Some(parent) = file_path.parent() {
            if !tokio::fs::try_exists(parent).await.unwrap_or(false) {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&file_path, bytes).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to write '{}': {}", file_path.display(), e),
            ))
        })
    }

    async fn existing_size(&self, rel_path: &str) -> Option<u64> {
        let file_path = safe_join(&self.root, rel_path).ok()?;
        let meta = tokio::fs::metadata(&file_path).await.ok()?;
        meta.is_file().then_some(meta.len())
    }
}

/// Sink writing every record into a single zip archive
///
/// Compression and file I/O run on the blocking pool; each record takes the
/// writer lock once, so appends never interleave.
pub struct ArchiveSink {
    writer: Arc<Mutex<Option<ZipWriter<std::fs::File>>>>,
}

impl ArchiveSink {
    /// Create the archive file (and its parent directories)
    pub async fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::File::create(path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to create zip file '{}': {}", path.display(), e),
            ))
        })?;
        Ok(Self {
            writer: Arc::new(Mutex::new(Some(ZipWriter::new(file.into_std().await)))),
        })
    }

    /// Run `op` against the open writer on the blocking pool
    async fn with_writer<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut ZipWriter<std::fs::File>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let writer = self.writer.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = writer
                .lock()
                .map_err(|_| Error::Other("zip writer lock poisoned".to_string()))?;
            let writer = guard
                .as_mut()
                .ok_or_else(|| Error::Other("zip archive already finalized".to_string()))?;
            op(writer)
        })
        .await
        .map_err(|e| Error::Other(format!("zip writer task panicked: {e}")))?
    }
}

/// Archive record name: relative, `/`-separated, no leading separator
fn record_name(rel_path: &str) -> String {
    rel_path.trim_start_matches('/').to_string()
}

#[async_trait]
impl Sink for ArchiveSink {
    async fn create_container(&self, rel_path: &str) -> Result<()> {
        let mut name = record_name(rel_path);
        if !name.ends_with('/') {
            name.push('/');
        }
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        self.with_writer(move |writer| {
            writer.add_directory(name, options)?;
            Ok(())
        })
        .await
    }

    async fn write_entry(&self, rel_path: &str, bytes: &[u8]) -> Result<()> {
        let name = record_name(rel_path);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let bytes = bytes.to_vec();
        self.with_writer(move |writer| {
            writer.start_file(name, options)?;
            writer.write_all(&bytes)?;
            Ok(())
        })
        .await
    }

    async fn finish(&self) -> Result<()> {
        let writer = self.writer.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = writer
                .lock()
                .map_err(|_| Error::Other("zip writer lock poisoned".to_string()))?;
            if let Some(mut writer) = guard.take() {
                writer.finish()?;
            }
            Ok::<(), Error>(())
        })
        .await
        .map_err(|e| Error::Other(format!("zip writer task panicked: {e}")))?
    }
}
