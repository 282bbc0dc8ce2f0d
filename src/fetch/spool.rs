//! Verified downloads materialized as temporary spool files

use super::http::open_body;
use crate::checksum::{CopyError, copy_and_hash, digest_matches};
use crate::error::{Error, Result};
use crate::types::{DigestAlgorithm, ResourceDescriptor};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tempfile::TempPath;
use tokio_util::sync::CancellationToken;

/// A fully downloaded and verified spool file, open for reading
///
/// The file lives until [`SpooledFile::release`] is called or the value is
/// dropped; either way it is closed and deleted exactly once.
#[derive(Debug)]
pub struct SpooledFile {
    file: File,
    path: TempPath,
}

impl SpooledFile {
    pub(crate) fn new(file: File, path: TempPath) -> Self {
        Self { file, path }
    }

    /// Location of the spool file on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the read handle and keep only the path guard
    ///
    /// For consumers that need a filesystem path (external tools) rather than a
    /// stream. The file is still deleted when the returned guard is dropped.
    pub fn into_temp_path(self) -> TempPath {
        drop(self.file);
        self.path
    }

    /// Close the handle and delete the file
    pub fn release(self) -> Result<()> {
        let path = self.path.to_path_buf();
        self.into_temp_path()
            .close()
            .map_err(|e| Error::storage("unable to remove file", path, e))
    }
}

impl Read for SpooledFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

/// Download `descriptor` into a fresh temp file in `spool_dir` and verify it
///
/// Returns the reopened, read-only spool file on success. On every failure the
/// partially written file is deleted before the error is returned.
pub async fn store(
    client: &reqwest::Client,
    spool_dir: &Path,
    descriptor: &ResourceDescriptor,
    algorithm: DigestAlgorithm,
    cancel: &CancellationToken,
) -> Result<SpooledFile> {
    let url = descriptor.url();

    let named = tempfile::Builder::new()
        .prefix(&format!("{}.", descriptor.file_name()))
        .tempfile_in(spool_dir)
        .map_err(|e| Error::storage("unable to create temporary file in", spool_dir, e))?;
    let (file, path) = named.into_parts();
    tracing::debug!(url, path = %path.display(), "Spooling download");

    let mut body = open_body(client, url, cancel).await?;
    let mut sink = tokio::fs::File::from_std(file);

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        outcome = copy_and_hash(&mut body, &mut sink, algorithm) => outcome.map_err(|e| match e {
            CopyError::Read(e) => Error::network(url, e),
            CopyError::Write(e) => Error::storage("unable to copy download to", &*path, e),
        })?,
    };

    if !digest_matches(descriptor.digest(), &outcome.digest) {
        return Err(Error::DigestMismatch {
            url: url.to_string(),
            expected: descriptor.digest().to_string(),
            actual: outcome.digest,
        });
    }

    sink.sync_all()
        .await
        .map_err(|e| Error::storage("unable to close the following file", &*path, e))?;
    drop(sink);

    let file = File::open(&path)
        .map_err(|e| Error::storage("unable to open the following file", &*path, e))?;

    tracing::debug!(url, bytes = outcome.bytes, path = %path.display(), "Download verified");
    Ok(SpooledFile::new(file, path))
}
