//! Configuration types for wikidump-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Main configuration for [`DumpHub`](crate::DumpHub)
///
/// Every field has a default, so `Config::default()` works out of the box and a
/// partial JSON/TOML document only needs to name what it overrides.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Directory for temporary spool files (default: system temp dir)
    #[serde(default = "default_spool_dir")]
    pub spool_dir: PathBuf,

    /// Backoff policy for failed fetch attempts
    #[serde(default)]
    pub retry: RetryConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// External tool paths and 7z backend selection
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spool_dir: default_spool_dir(),
            retry: RetryConfig::default(),
            http: HttpConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Config {
    /// Reject settings that cannot drive a fetch
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()
    }
}

/// Retry configuration for failed fetch attempts
///
/// The defaults double a one second delay after every failure and give up after
/// twelve retries, which is a little over an hour of waiting in total.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt (default: 12)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 1 hour)
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
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Check that the backoff grows monotonically
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `backoff_multiplier` is not a finite
    /// number of at least 1.0.
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::config(
                format!(
                    "backoff multiplier must be a finite number >= 1.0, got {}",
                    self.backoff_multiplier
                ),
                Some("retry.backoff_multiplier"),
            ));
        }
        Ok(())
    }
}

/// HTTP client configuration
///
/// No whole-request timeout is applied; a single dump body can take hours.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// TCP connect timeout (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Which 7z implementation decodes solid archives
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveBackendKind {
    /// External 7z binary when one is found, in-process decoder otherwise
    #[default]
    Auto,
    /// External 7z binary only; hub construction fails if none is found
    External,
    /// In-process decoder only
    Native,
}

/// External tool paths and 7z backend selection
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to 7z executable (auto-detected if None)
    #[serde(default)]
    pub sevenzip_path: Option<PathBuf>,

    /// Whether to search PATH for the 7z binary if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// 7z implementation to use (default: auto)
    #[serde(default)]
    pub archive_backend: ArchiveBackendKind,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            sevenzip_path: None,
            search_path: true,
            archive_backend: ArchiveBackendKind::default(),
        }
    }
}

fn default_spool_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_max_attempts() -> u32 {
    12
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(3600)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("wikidump-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
