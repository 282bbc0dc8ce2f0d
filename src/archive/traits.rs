//! Traits and types for solid archive access

use async_trait::async_trait;
use std::io::Read;
use std::path::Path;

/// One member of a solid archive, as reported by the listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path of the member inside the archive
    pub path: String,
    /// Uncompressed size, when the backend reports it
    pub size: Option<u64>,
    /// Whether the member is a directory
    pub is_dir: bool,
}

/// Readable content of one archive entry
///
/// `close` must run exactly once; implementations also clean up on drop when it
/// never ran.
pub trait EntryReader: Read + Send {
    /// Release whatever backs the reader and report deferred failures
    fn close(self: Box<Self>) -> crate::Result<()>;
}

/// Trait for listing and opening 7z archives
///
/// Implementations can use the external `7z` binary or an in-process decoder.
/// Both work on a filesystem path, never on a stream: the format keeps its
/// header at the end of the file.
///
/// # Examples
///
/// ```no_run
/// use wikidump_dl::archive::{CliSevenZip, SolidArchive};
/// use std::io::Read;
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = CliSevenZip::from_path().expect("7z not found in PATH");
/// let archive = Path::new("pages-meta-history1.xml.7z");
///
/// let entries = backend.list_entries(archive).await?;
/// let mut reader = backend.open_entry(archive, &entries[0]).await?;
/// let mut head = [0u8; 512];
/// reader.read(&mut head)?;
/// reader.close()?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait SolidArchive: Send + Sync {
    /// List every entry of the archive at `archive`
    ///
    /// # Errors
    ///
    /// Returns an [`ArchiveError`](crate::error::ArchiveError) when the archive
    /// cannot be read or the tool fails.
    async fn list_entries(&self, archive: &Path) -> crate::Result<Vec<ArchiveEntry>>;

    /// Open a reader over the decompressed content of `entry`
    async fn open_entry(
        &self,
        archive: &Path,
        entry: &ArchiveEntry,
    ) -> crate::Result<Box<dyn EntryReader>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
