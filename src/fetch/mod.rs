//! Retrying, verifying downloads into spool files
//!
//! [`Fetcher::fetch`] wraps one [`spool::store`] attempt in the backoff loop from
//! [`crate::retry`]. Each attempt starts over with a brand new temp file; a
//! failed attempt never leaves anything behind in the spool directory.

pub mod http;
pub mod spool;

pub use spool::SpooledFile;

use crate::config::RetryConfig;
use crate::error::Result;
use crate::retry::fetch_with_retry;
use crate::types::ResourceDescriptor;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Downloads descriptors into verified spool files, retrying on failure
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    spool_dir: PathBuf,
    retry: RetryConfig,
}

impl Fetcher {
    /// Create a fetcher writing spool files into `spool_dir`
    pub fn new(client: reqwest::Client, spool_dir: PathBuf, retry: RetryConfig) -> Self {
        Self {
            client,
            spool_dir,
            retry,
        }
    }

    /// Directory spool files are created in
    pub fn spool_dir(&self) -> &Path {
        &self.spool_dir
    }

    /// Download and verify `descriptor`, retrying with backoff
    ///
    /// A descriptor whose digest cannot name a hash algorithm fails immediately
    /// without touching the network.
    pub async fn fetch(
        &self,
        descriptor: &ResourceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<SpooledFile> {
        let algorithm = descriptor.algorithm()?;
        tracing::debug!(url = descriptor.url(), ?algorithm, "Fetching resource");

        let result = fetch_with_retry(&self.retry, cancel, || {
            spool::store(&self.client, &self.spool_dir, descriptor, algorithm, cancel)
        })
        .await;

        match &result {
            Ok(spooled) => tracing::info!(
                url = descriptor.url(),
                path = %spooled.path().display(),
                "Resource downloaded and verified"
            ),
            Err(e) => tracing::error!(url = descriptor.url(), error = %e, "Resource fetch failed"),
        }
        result
    }
}
