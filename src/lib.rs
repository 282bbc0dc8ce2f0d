//! # wikidump-dl
//!
//! Fetch, verify and decompress wiki dump files as sequential byte streams.
//!
//! ## Design Philosophy
//!
//! wikidump-dl is designed to be:
//! - **Verified** - No byte reaches the caller before the whole file matched its digest
//! - **Patient** - Transient network failures are retried with exponential backoff
//! - **Cancellable** - Every network wait and backoff sleep races a cancellation token
//! - **Disk-bounded** - Each open stream owns exactly one spool file, deleted on close
//!
//! ## Quick Start
//!
//! ```no_run
//! use wikidump_dl::{Catalog, Config, DumpHub, ResourceDescriptor};
//! use chrono::NaiveDate;
//! use std::io::Read;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut catalog = Catalog::new();
//!     catalog.insert(
//!         "pages-articles",
//!         vec![ResourceDescriptor::new(
//!             "https://dumps.example.org/enwiki/20240101/enwiki-20240101-pages-articles1.xml.bz2",
//!             "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed",
//!         )],
//!     );
//!
//!     let date = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
//!     let hub = DumpHub::new(catalog, date, Config::default())?;
//!     let cancel = wikidump_dl::cancel_on_signal();
//!
//!     let mut resources = hub.open("pages-articles");
//!     while let Some(mut stream) = resources.next(&cancel).await? {
//!         // Read on a blocking thread; decoding is CPU-bound
//!         let bytes = tokio::task::spawn_blocking(move || {
//!             let mut buf = Vec::new();
//!             stream.read_to_end(&mut buf)?;
//!             stream.close()?;
//!             Ok::<_, Box<dyn std::error::Error + Send + Sync>>(buf.len())
//!         })
//!         .await??;
//!         println!("read {} bytes", bytes);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// 7z solid archive backends
pub mod archive;
/// Digest computation while copying
pub mod checksum;
/// Configuration types
pub mod config;
/// Decompression of verified spool files
pub mod decompress;
/// Error types
pub mod error;
/// HTTP download into verified spool files
pub mod fetch;
/// Named dump access and resource iteration
pub mod hub;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types
pub mod types;

// Re-export commonly used types
pub use archive::{CliSevenZip, NativeSevenZip, SolidArchive};
pub use config::{ArchiveBackendKind, Config, HttpConfig, RetryConfig, ToolsConfig};
pub use decompress::DumpStream;
pub use error::{ArchiveError, Error, Result, ToolExitMeaning};
pub use hub::{DumpHub, ResourceStream};
pub use types::{Catalog, Compression, DigestAlgorithm, ResourceDescriptor};

use tokio_util::sync::CancellationToken;

/// Create a token that is cancelled when the process receives a termination
/// signal.
///
/// Must be called from within a tokio runtime.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub fn cancel_on_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Cancelling in-flight dump fetches");
        trigger.cancel();
    });
    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_token_starts_live() {
        let token = cancel_on_signal();
        tokio::task::yield_now().await;
        assert!(!token.is_cancelled());
    }
}
