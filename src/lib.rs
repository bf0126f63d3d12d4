//! # gitdig
//!
//! Mirror a directory of a GitHub repository onto local storage without
//! cloning it.
//!
//! ## Design Philosophy
//!
//! gitdig is designed to be:
//! - **Bounded** - at most `concurrency` file transfers in flight, with the
//!   traversal pausing while the pool is full
//! - **Forgiving** - transient failures are retried with backoff, rate limits
//!   are waited out, and an unreadable subtree does not stop the run
//! - **Event-driven** - consumers subscribe to progress events, no polling
//! - **Testable** - the network is behind the [`ContentSource`] trait and the
//!   destination behind [`sink::Sink`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use gitdig::{Config, Mirror};
//! use gitdig::github::resolve_targets;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         concurrency: 8,
//!         ..Default::default()
//!     };
//!     let mirror = Mirror::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = mirror.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let targets = resolve_targets(&["rust-lang/rust/tree/master/src/etc".to_string()], None, false)?;
//!     for target in &targets {
//!         let report = mirror.run(target).await?;
//!         println!("{}", report.summary());
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// GitHub API access and target resolution
pub mod github;
/// Mirror engine (decomposed into focused submodules)
pub mod mirror;
/// Bounded worker pool
pub mod pool;
/// Retry logic with exponential backoff
pub mod retry;
/// Destinations: directory tree or zip archive
pub mod sink;
/// Run counters
pub mod stats;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, HttpConfig, OutputMode, RetryConfig};
pub use error::{Error, Result};
pub use github::{ContentSource, GitHubClient};
pub use mirror::{Mirror, PreviewReport, RunReport, SubtreeWarning};
pub use stats::{Stats, StatsSnapshot};
pub use types::{DownloadTarget, Entry, EntryKind, Event, Repository};
