//! Turning a verified spool file into a decompressed byte stream
//!
//! gzip and bzip2 are decoded on the fly while the caller reads. A 7z spool file
//! is handed to the configured [`SolidArchive`] backend by path and must contain
//! exactly one entry.
//!
//! Whatever the format, the returned [`DumpStream`] owns the spool file: closing
//! or dropping the stream deletes it.

use crate::archive::{EntryReader, SolidArchive};
use crate::error::{ArchiveError, Error, Result};
use crate::fetch::SpooledFile;
use crate::types::Compression;
use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use std::fmt;
use std::io::Read;
use std::path::Path;
use tempfile::TempPath;

/// A reader whose bytes come from a spool file it is responsible for deleting
trait SpoolBacked: Read + Send {
    /// Path of the underlying spool file
    fn spool_path(&self) -> &Path;

    /// Close every layer and delete the spool file
    fn release(self: Box<Self>) -> Result<()>;
}

impl SpoolBacked for SpooledFile {
    fn spool_path(&self) -> &Path {
        self.path()
    }

    fn release(self: Box<Self>) -> Result<()> {
        SpooledFile::release(*self)
    }
}

impl SpoolBacked for MultiGzDecoder<SpooledFile> {
    fn spool_path(&self) -> &Path {
        self.get_ref().path()
    }

    fn release(self: Box<Self>) -> Result<()> {
        self.into_inner().release()
    }
}

impl SpoolBacked for MultiBzDecoder<SpooledFile> {
    fn spool_path(&self) -> &Path {
        self.get_ref().path()
    }

    fn release(self: Box<Self>) -> Result<()> {
        self.into_inner().release()
    }
}

/// The single entry of a 7z spool file
struct ArchiveEntryStream {
    entry: Box<dyn EntryReader>,
    spool: TempPath,
}

impl Read for ArchiveEntryStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.entry.read(buf)
    }
}

impl SpoolBacked for ArchiveEntryStream {
    fn spool_path(&self) -> &Path {
        &self.spool
    }

    fn release(self: Box<Self>) -> Result<()> {
        let ArchiveEntryStream { entry, spool } = *self;
        let entry_result = entry.close();

        let path = spool.to_path_buf();
        let spool_result = spool
            .close()
            .map_err(|e| Error::storage("unable to remove file", path, e));

        // Entry failures are reported ahead of spool removal failures
        entry_result.and(spool_result)
    }
}

/// Decompressed content of one resource
///
/// Reads yield the decoded bytes. The stream owns the spool file it reads from;
/// [`DumpStream::close`] deletes it and reports failures, dropping an unclosed
/// stream deletes it and logs them.
pub struct DumpStream {
    inner: Option<Box<dyn SpoolBacked>>,
    compression: Compression,
    url: String,
}

impl DumpStream {
    fn new(inner: Box<dyn SpoolBacked>, compression: Compression, url: &str) -> Self {
        Self {
            inner: Some(inner),
            compression,
            url: url.to_string(),
        }
    }

    /// URL the content was downloaded from
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Container format the content was decoded from
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Path of the spool file backing this stream
    pub fn spool_path(&self) -> Option<&Path> {
        self.inner.as_ref().map(|inner| inner.spool_path())
    }

    /// Close the stream and delete its spool file
    ///
    /// Returns the first failure: closing the archive entry, then removing the
    /// spool file.
    pub fn close(mut self) -> Result<()> {
        match self.inner.take() {
            Some(inner) => {
                tracing::debug!(url = %self.url, "Closing dump stream");
                inner.release()
            }
            None => Ok(()),
        }
    }
}

impl Read for DumpStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.inner.as_mut() {
            Some(inner) => inner.read(buf),
            None => Ok(0),
        }
    }
}

impl Drop for DumpStream {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take()
            && let Err(e) = inner.release()
        {
            tracing::warn!(url = %self.url, error = %e, "Failed to release dropped dump stream");
        }
    }
}

impl fmt::Debug for DumpStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DumpStream")
            .field("url", &self.url)
            .field("compression", &self.compression)
            .field("spool_path", &self.spool_path())
            .finish()
    }
}

/// Wrap a verified spool file in the decoder for `compression`
///
/// For 7z, the spool file is listed through `archive` and must hold exactly one
/// entry. On any failure the spool file is deleted before the error returns.
pub async fn open(
    spooled: SpooledFile,
    compression: Compression,
    archive: &dyn SolidArchive,
    url: &str,
) -> Result<DumpStream> {
    let inner: Box<dyn SpoolBacked> = match compression {
        Compression::None => Box::new(spooled),
        Compression::Gzip => Box::new(MultiGzDecoder::new(spooled)),
        Compression::Bzip2 => Box::new(MultiBzDecoder::new(spooled)),
        Compression::SevenZip => Box::new(open_single_entry(spooled, archive).await?),
    };

    tracing::debug!(url, ?compression, path = %inner.spool_path().display(), "Opened dump stream");
    Ok(DumpStream::new(inner, compression, url))
}

async fn open_single_entry(
    spooled: SpooledFile,
    archive: &dyn SolidArchive,
) -> Result<ArchiveEntryStream> {
    let spool = spooled.into_temp_path();

    let entries = archive.list_entries(&spool).await?;
    let [entry] = entries.as_slice() else {
        return Err(ArchiveError::EntryCount {
            path: spool.to_path_buf(),
            count: entries.len(),
        }
        .into());
    };

    tracing::debug!(
        backend = archive.name(),
        entry = %entry.path,
        size = ?entry.size,
        "Opening 7z entry"
    );
    let entry = archive.open_entry(&spool, entry).await?;

    Ok(ArchiveEntryStream { entry, spool })
}
