//! Error types for gitdig
//!
//! This module provides the error taxonomy used throughout the crate:
//! - Transport failures (network, HTTP status, API errors)
//! - Rate-limit exhaustion that could not be waited out
//! - Local persistence failures (I/O, archive)
//! - Configuration and target-resolution errors
//! - Run-level partial failure reported after a mirror completes

use thiserror::Error;

/// Result type alias for gitdig operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for gitdig
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency")
        key: Option<String>,
    },

    /// A user-supplied target could not be resolved to owner/repo/branch/path
    #[error("invalid target '{input}': {reason}")]
    InvalidTarget {
        /// The raw string that was supplied
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// The contents API answered with an unexpected status
    #[error("GitHub API error: {status} - {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, as text
        body: String,
    },

    /// A raw file download answered with a non-200 status
    #[error("HTTP error {status} fetching {url}")]
    Http {
        /// HTTP status code
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// Rate limit exceeded and the server gave no reset hint to wait for
    #[error("GitHub API rate limit exceeded; try authenticating with --token")]
    RateLimited,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip archive write error
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Some files of a target could not be transferred
    #[error("{failures} files failed to download")]
    PartialFailure {
        /// Number of files that exhausted their retries
        failures: u64,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Shorthand for an invalid target error
    pub fn invalid_target(input: &str, reason: impl Into<String>) -> Self {
        Error::InvalidTarget {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
