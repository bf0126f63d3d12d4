//! Configuration types for gitdig

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Environment variable consulted when no token is configured
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// Tool name reported in the User-Agent header
pub const APP_NAME: &str = "gitdig";

/// Tool version reported in the User-Agent header
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Where downloaded bytes are persisted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Mirror the remote tree as a directory tree (default)
    #[default]
    Directory,
    /// Write everything into a single zip archive
    Archive,
}

/// Main configuration for a [`Mirror`](crate::Mirror)
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// API token (falls back to `GITHUB_TOKEN` when unset)
    #[serde(default)]
    pub token: Option<String>,

    /// Base output directory (None = derive from the repository name)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Descend into subdirectories (default: true)
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// Maximum simultaneous file transfers (default: 5)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Emit per-file progress at info level
    #[serde(default)]
    pub verbose: bool,

    /// Output format
    #[serde(default)]
    pub output: OutputMode,

    /// List the remote tree without downloading anything
    #[serde(default)]
    pub preview: bool,

    /// Skip files whose local size already matches the remote size
    #[serde(default)]
    pub update: bool,

    /// Per-file retry behavior
    #[serde(default)]
    pub retry: RetryConfig,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: None,
            output_dir: None,
            recursive: true,
            concurrency: default_concurrency(),
            verbose: false,
            output: OutputMode::default(),
            preview: false,
            update: false,
            retry: RetryConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| Error::Config {
            message: e.to_string(),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::config("concurrency", "must be at least 1"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(Error::config("http.user_agent", "must not be empty"));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "must be at least 1.0",
            ));
        }
        url::Url::parse(&self.http.api_base_url)
            .map_err(|e| Error::config("http.api_base_url", e.to_string()))?;
        Ok(())
    }

    /// Token to send, from the config or else the environment
    pub fn resolve_token(&self) -> Option<String> {
        resolve_token_with(
            self.token.as_deref(),
            std::env::var(TOKEN_ENV_VAR).ok().as_deref(),
        )
    }

    /// Whether output goes to a zip archive
    pub fn is_archive(&self) -> bool {
        self.output == OutputMode::Archive
    }
}

/// Pick the explicit token if non-empty, otherwise the environment value
pub(crate) fn resolve_token_with(explicit: Option<&str>, env: Option<&str>) -> Option<String> {
    explicit
        .filter(|t| !t.trim().is_empty())
        .or(env.filter(|t| !t.trim().is_empty()))
        .map(|t| t.trim().to_string())
}

/// Retry configuration for per-file transfers
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 3, so 4 attempts total)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry (default: 100ms)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Retry config with the given retry count and default timings
    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }
}

/// HTTP transport configuration shared by listing and fetch calls
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Base URL of the REST API (default: "https://api.github.com")
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// User-Agent header value (default: "gitdig/<version>")
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_user_agent() -> String {
    format!("{APP_NAME}/{APP_VERSION}")
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

// Durations are written as whole milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
