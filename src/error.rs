//! Error types for wikidump-dl
//!
//! Every failure a fetch can hit is one variant of [`Error`]. Variants carry the
//! URL or spool path involved so a surfaced error is enough to diagnose a broken
//! resource without re-running it.
//!
//! [`Error`] is `Clone`: a [`ResourceStream`](crate::hub::ResourceStream) that has
//! failed hands the same error back on every later call. Sources that are not
//! cloneable themselves (`reqwest::Error`, `std::io::Error`) are held in an `Arc`.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for wikidump-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for wikidump-dl
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The requested name is not present in the catalog
    #[error("unknown resource: {name} not found")]
    UnknownResource {
        /// The logical name that was looked up
        name: String,
    },

    /// The caller's cancellation token fired
    #[error("operation cancelled")]
    Cancelled,

    /// Request or transport failure
    #[error("network error fetching {url}: {source}")]
    Network {
        /// URL being fetched
        url: String,
        /// Underlying HTTP client or body transport error
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// Server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// URL being fetched
        url: String,
        /// HTTP status code returned by the server
        status: u16,
    },

    /// Downloaded bytes do not match the expected digest
    #[error("digest mismatch for {url}: expected {expected}, got {actual}")]
    DigestMismatch {
        /// URL the content was downloaded from
        url: String,
        /// Digest declared by the resource descriptor
        expected: String,
        /// Digest computed over the downloaded bytes
        actual: String,
    },

    /// Spool file create/write/close/reopen/remove failure
    #[error("{action} {path}: {source}")]
    Storage {
        /// What was being attempted (e.g. "unable to create temporary file in")
        action: &'static str,
        /// Spool file or directory involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: Arc<std::io::Error>,
    },

    /// 7z archive handling failed
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "spool_dir")
        key: Option<String>,
    },
}

impl Error {
    /// Build a [`Error::Network`] for `url`
    pub fn network(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Network {
            url: url.into(),
            source: Arc::new(source),
        }
    }

    /// Build a [`Error::Storage`] for `path`
    pub fn storage(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Storage {
            action,
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Build a [`Error::Config`]
    pub fn config(message: impl Into<String>, key: Option<&str>) -> Self {
        Error::Config {
            message: message.into(),
            key: key.map(str::to_string),
        }
    }

    /// Get the machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::UnknownResource { .. } => "unknown_resource",
            Error::Cancelled => "cancelled",
            Error::Network { .. } => "network_error",
            Error::HttpStatus { .. } => "http_status",
            Error::DigestMismatch { .. } => "digest_mismatch",
            Error::Storage { .. } => "storage_error",
            Error::Archive(e) => match e {
                ArchiveError::EntryCount { .. } => "archive_entry_count",
                ArchiveError::Tool { .. } => "archive_tool_failed",
                ArchiveError::ToolNotFound { .. } => "archive_tool_not_found",
                ArchiveError::Native { .. } => "archive_decode_failed",
                ArchiveError::Io { .. } => "archive_io_error",
            },
            Error::Config { .. } => "config_error",
        }
    }
}

/// 7z archive errors
///
/// None of these are retried: a wrong entry count or a broken tool is a
/// structural problem, not a transient one.
#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    /// The archive does not hold exactly one entry
    #[error("entries count differs from one - {count} - for file {path}")]
    EntryCount {
        /// Spool file holding the archive
        path: PathBuf,
        /// Number of entries found
        count: usize,
    },

    /// The external archive tool failed
    #[error("{meaning} while {operation} {path}: {message}")]
    Tool {
        /// Spool file holding the archive
        path: PathBuf,
        /// What the tool was doing (e.g. "listing content of file")
        operation: &'static str,
        /// Best-effort classification of the tool's exit status
        meaning: ToolExitMeaning,
        /// Raw error output or spawn error
        message: String,
    },

    /// The external archive tool could not be located
    #[error("archive tool not found: {tool}")]
    ToolNotFound {
        /// Binary name or configured path
        tool: String,
    },

    /// The in-process 7z decoder failed
    #[error("failed to decode 7z archive {path}: {message}")]
    Native {
        /// Spool file holding the archive
        path: PathBuf,
        /// Decoder error message
        message: String,
    },

    /// I/O failure while staging an archive entry
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: Arc<std::io::Error>,
    },
}

/// Meaning of a 7z exit status
///
/// 7z reports failures through its exit code only; this maps the documented
/// codes to something an operator can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolExitMeaning {
    /// Exit code 1
    Warning,
    /// Exit code 2
    Fatal,
    /// Exit code 3
    ChangeIdentified,
    /// Exit code 7
    CommandLine,
    /// Exit code 8
    OutOfMemory,
    /// Exit code 255
    UserStopped,
    /// Spawn failure, signal, or an undocumented exit code
    Error,
}

impl ToolExitMeaning {
    /// Classify a process exit code (`None` when killed by a signal)
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(1) => ToolExitMeaning::Warning,
            Some(2) => ToolExitMeaning::Fatal,
            Some(3) => ToolExitMeaning::ChangeIdentified,
            Some(7) => ToolExitMeaning::CommandLine,
            Some(8) => ToolExitMeaning::OutOfMemory,
            Some(255) => ToolExitMeaning::UserStopped,
            _ => ToolExitMeaning::Error,
        }
    }
}

impl fmt::Display for ToolExitMeaning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ToolExitMeaning::Warning => "Warning",
            ToolExitMeaning::Fatal => "Fatal error",
            ToolExitMeaning::ChangeIdentified => "Change identified",
            ToolExitMeaning::CommandLine => "Command line error",
            ToolExitMeaning::OutOfMemory => "Not enough memory for operation",
            ToolExitMeaning::UserStopped => "User stopped the process",
            ToolExitMeaning::Error => "Error",
        };
        f.write_str(text)
    }
}
