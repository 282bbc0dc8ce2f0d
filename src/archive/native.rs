//! In-process 7z decoding with sevenz-rust
//!
//! The decoder only offers callback-style iteration over entries, so an opened
//! entry is first staged into a temp file next to the archive and then read
//! back. The staged copy is deleted when the reader is closed or dropped.

use super::traits::{ArchiveEntry, EntryReader, SolidArchive};
use crate::error::{ArchiveError, Error};
use async_trait::async_trait;
use sevenz_rust::{Password, SevenZReader};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;

/// 7z backend built on the pure-Rust `sevenz-rust` decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeSevenZip;

impl NativeSevenZip {
    /// Create the native backend
    pub fn new() -> Self {
        Self
    }
}

fn native_error(archive: &Path, message: impl ToString) -> Error {
    Error::Archive(ArchiveError::Native {
        path: archive.to_path_buf(),
        message: message.to_string(),
    })
}

fn io_error(path: &Path, source: std::io::Error) -> Error {
    Error::Archive(ArchiveError::Io {
        path: path.to_path_buf(),
        source: Arc::new(source),
    })
}

fn list_blocking(archive: &Path) -> crate::Result<Vec<ArchiveEntry>> {
    let reader =
        SevenZReader::open(archive, Password::empty()).map_err(|e| native_error(archive, e))?;

    Ok(reader
        .archive()
        .files
        .iter()
        .map(|file| ArchiveEntry {
            path: file.name.clone(),
            size: Some(file.size),
            is_dir: file.is_directory,
        })
        .collect())
}

fn stage_blocking(archive: &Path, wanted: &str) -> crate::Result<StagedEntry> {
    let dir = archive.parent().unwrap_or_else(|| Path::new("."));
    let stem = Path::new(wanted)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "entry".to_string());

    let staged = tempfile::Builder::new()
        .prefix(&format!("{}.entry.", stem))
        .tempfile_in(dir)
        .map_err(|e| io_error(dir, e))?;
    let (mut file, path) = staged.into_parts();

    let mut reader =
        SevenZReader::open(archive, Password::empty()).map_err(|e| native_error(archive, e))?;

    let mut found = false;
    let mut copy_error: Option<std::io::Error> = None;
    reader
        .for_each_entries(|entry, data| {
            if entry.name != wanted {
                // Solid blocks decode sequentially; skipped entries are still read through
                if let Err(e) = std::io::copy(data, &mut std::io::sink()) {
                    copy_error = Some(e);
                    return Ok(false);
                }
                return Ok(true);
            }
            found = true;
            if let Err(e) = std::io::copy(data, &mut file) {
                copy_error = Some(e);
            }
            Ok(false)
        })
        .map_err(|e| native_error(archive, e))?;

    if let Some(e) = copy_error {
        return Err(io_error(&path, e));
    }
    if !found {
        return Err(native_error(
            archive,
            format!("entry {} not found in archive", wanted),
        ));
    }

    file.sync_all().map_err(|e| io_error(&path, e))?;
    drop(file);
    let file = File::open(&path).map_err(|e| io_error(&path, e))?;

    Ok(StagedEntry { file, path })
}

async fn run_blocking<T, F>(archive: &Path, task: F) -> crate::Result<T>
where
    T: Send + 'static,
    F: FnOnce(PathBuf) -> crate::Result<T> + Send + 'static,
{
    let owned = archive.to_path_buf();
    tokio::task::spawn_blocking(move || task(owned))
        .await
        .map_err(|e| native_error(archive, format!("decoder task failed: {}", e)))?
}

#[async_trait]
impl SolidArchive for NativeSevenZip {
    async fn list_entries(&self, archive: &Path) -> crate::Result<Vec<ArchiveEntry>> {
        let entries = run_blocking(archive, |path| list_blocking(&path)).await?;
        tracing::debug!(archive = %archive.display(), count = entries.len(), "Listed 7z entries");
        Ok(entries)
    }

    async fn open_entry(
        &self,
        archive: &Path,
        entry: &ArchiveEntry,
    ) -> crate::Result<Box<dyn EntryReader>> {
        let wanted = entry.path.clone();
        let staged = run_blocking(archive, move |path| stage_blocking(&path, &wanted)).await?;
        tracing::debug!(
            archive = %archive.display(),
            staged = %staged.path.display(),
            "Staged 7z entry"
        );
        Ok(Box::new(staged))
    }

    fn name(&self) -> &'static str {
        "native-7z"
    }
}

/// Decompressed entry copied to a temp file
struct StagedEntry {
    file: File,
    path: TempPath,
}

impl Read for StagedEntry {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl EntryReader for StagedEntry {
    fn close(self: Box<Self>) -> crate::Result<()> {
        let StagedEntry { file, path } = *self;
        drop(file);
        let location = path.to_path_buf();
        path.close().map_err(|e| io_error(&location, e))
    }
}
