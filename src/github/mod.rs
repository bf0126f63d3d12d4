//! GitHub access: the contents client, its clock, and target resolution
//!
//! - [`client`] - contents listing, raw file fetches, repository browsing
//! - [`clock`] - wall clock and sleep used for rate-limit waits
//! - [`repos`] - numbered repository menu and selection prompt
//! - [`target`] - parsing user input into download targets

pub mod client;
pub mod clock;
pub mod repos;
pub mod target;

pub use client::{ContentSource, GitHubClient, rate_limit_wait};
pub use clock::{Clock, ManualClock, SystemClock};
pub use repos::{format_repository_list, parse_selection, prompt_selection};
pub use target::{RepoLocation, parse_location, read_targets_file, resolve_targets};
