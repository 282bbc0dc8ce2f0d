//! Test configuration helpers for building hubs over a temp spool directory

use chrono::NaiveDate;
use std::time::Duration;
use tempfile::TempDir;
use wikidump_dl::config::{ArchiveBackendKind, RetryConfig, ToolsConfig};
use wikidump_dl::{Catalog, Config, DumpHub};

/// Dump date used by every test hub
pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// Retry policy with millisecond delays
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// Config spooling into `spool` with the in-process 7z backend
pub fn test_config(spool: &TempDir, retry: RetryConfig) -> Config {
    Config {
        spool_dir: spool.path().to_path_buf(),
        retry,
        tools: ToolsConfig {
            archive_backend: ArchiveBackendKind::Native,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Hub over `catalog` with fast retries and a private spool directory
pub fn test_hub(catalog: Catalog, spool: &TempDir) -> DumpHub {
    DumpHub::new(catalog, test_date(), test_config(spool, fast_retry(3))).unwrap()
}
