//! 7z access through the external `7z` binary

use super::traits::{ArchiveEntry, EntryReader, SolidArchive};
use crate::error::{ArchiveError, Error, ToolExitMeaning};
use async_trait::async_trait;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, ExitStatus, Stdio};
use std::thread::JoinHandle;
use tokio::process::Command;

/// Binary names tried, in order, when searching PATH
const BINARY_NAMES: [&str; 3] = ["7z", "7za", "7zz"];

/// 7z backend that shells out to an external binary
///
/// Listing uses the technical listing (`7z l -slt`); an entry is streamed from
/// the tool's stdout (`7z e -so`).
///
/// # Examples
///
/// ```no_run
/// use wikidump_dl::archive::CliSevenZip;
/// use std::path::PathBuf;
///
/// // Create with explicit path
/// let backend = CliSevenZip::new(PathBuf::from("/usr/bin/7z"));
///
/// // Or auto-discover from PATH
/// let backend = CliSevenZip::from_path().expect("7z not found in PATH");
/// ```
#[derive(Debug, Clone)]
pub struct CliSevenZip {
    binary_path: PathBuf,
}

impl CliSevenZip {
    /// Create a new CLI backend with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find `7z`, `7za` or `7zz` in PATH
    pub fn from_path() -> Option<Self> {
        BINARY_NAMES
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(Self::new)
    }

    /// Path of the binary this backend runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    fn spawn_error(&self, archive: &Path, operation: &'static str, e: std::io::Error) -> Error {
        Error::Archive(ArchiveError::Tool {
            path: archive.to_path_buf(),
            operation,
            meaning: ToolExitMeaning::Error,
            message: format!("failed to execute {}: {}", self.binary_path.display(), e),
        })
    }
}

/// Arguments for `7z e` that write exactly `entry` to stdout
///
/// `-spd` turns off wildcard matching so `*`, `?` and `[` in the entry name are
/// literal, and `--` keeps names starting with `-` from being read as switches.
fn extract_args(archive: &Path, entry: &str) -> Vec<OsString> {
    vec![
        "e".into(),
        "-so".into(),
        "-spd".into(),
        "--".into(),
        archive.into(),
        entry.into(),
    ]
}

fn tool_failure(
    archive: &Path,
    operation: &'static str,
    status: ExitStatus,
    stderr: &str,
) -> ArchiveError {
    let stderr = stderr.trim();
    ArchiveError::Tool {
        path: archive.to_path_buf(),
        operation,
        meaning: ToolExitMeaning::from_exit_code(status.code()),
        message: if stderr.is_empty() {
            status.to_string()
        } else {
            format!("{}: {}", status, stderr)
        },
    }
}

#[async_trait]
impl SolidArchive for CliSevenZip {
    async fn list_entries(&self, archive: &Path) -> crate::Result<Vec<ArchiveEntry>> {
        const OPERATION: &str = "listing content of file";

        let output = Command::new(&self.binary_path)
            .arg("l")
            .arg("-slt")
            .arg(archive)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(archive, OPERATION, e))?;

        if !output.status.success() {
            return Err(tool_failure(
                archive,
                OPERATION,
                output.status,
                &String::from_utf8_lossy(&output.stderr),
            )
            .into());
        }

        let entries = parse_slt_listing(&String::from_utf8_lossy(&output.stdout));
        tracing::debug!(archive = %archive.display(), count = entries.len(), "Listed 7z entries");
        Ok(entries)
    }

    async fn open_entry(
        &self,
        archive: &Path,
        entry: &ArchiveEntry,
    ) -> crate::Result<Box<dyn EntryReader>> {
        const OPERATION: &str = "opening file";

        let mut child = std::process::Command::new(&self.binary_path)
            .args(extract_args(archive, &entry.path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(archive, OPERATION, e))?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(self.spawn_error(
                archive,
                OPERATION,
                std::io::Error::other("stdout was not captured"),
            ));
        };
        // Drained on its own thread so a chatty tool never blocks on a full pipe
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text);
                text
            })
        });

        Ok(Box::new(ToolEntryReader {
            child,
            stdout,
            stderr,
            archive: archive.to_path_buf(),
            status: None,
        }))
    }

    fn name(&self) -> &'static str {
        "cli-7z"
    }
}

/// Streams an entry from a running `7z e -so` process
struct ToolEntryReader {
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    archive: PathBuf,
    status: Option<ExitStatus>,
}

impl ToolEntryReader {
    const OPERATION: &'static str = "extracting file";

    fn stderr_text(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }

    /// Reap the child; a reader abandoned before EOF kills it first
    fn finish(&mut self) -> std::io::Result<Option<ExitStatus>> {
        if self.status.is_some() {
            return Ok(self.status);
        }
        let _ = self.child.kill();
        let _ = self.child.wait()?;
        let _ = self.stderr_text();
        Ok(None)
    }
}

impl Read for ToolEntryReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.stdout.read(buf)?;
        if n == 0 && !buf.is_empty() && self.status.is_none() {
            let status = self.child.wait()?;
            self.status = Some(status);
            if !status.success() {
                let stderr = self.stderr_text();
                let failure = tool_failure(&self.archive, Self::OPERATION, status, &stderr);
                return Err(std::io::Error::other(failure));
            }
        }
        Ok(n)
    }
}

impl EntryReader for ToolEntryReader {
    fn close(mut self: Box<Self>) -> crate::Result<()> {
        let status = self.finish().map_err(|e| {
            Error::Archive(ArchiveError::Io {
                path: self.archive.clone(),
                source: std::sync::Arc::new(e),
            })
        })?;

        match status {
            Some(status) if !status.success() => {
                let stderr = self.stderr_text();
                Err(tool_failure(&self.archive, Self::OPERATION, status, &stderr).into())
            }
            _ => Ok(()),
        }
    }
}

impl Drop for ToolEntryReader {
    fn drop(&mut self) {
        if self.status.is_none() {
            let _ = self.finish();
        }
    }
}

/// Parse the output of `7z l -slt` into archive entries
///
/// The technical listing prints one `Key = Value` block per entry after a
/// `----------` separator; the block before it describes the archive itself.
pub fn parse_slt_listing(output: &str) -> Vec<ArchiveEntry> {
    let mut entries: Vec<ArchiveEntry> = Vec::new();
    let mut in_entries = false;

    for line in output.lines() {
        let line = line.trim_end();
        if !in_entries {
            in_entries = line == "----------";
            continue;
        }

        let Some((key, value)) = line.split_once(" = ") else {
            continue;
        };
        match key {
            "Path" => entries.push(ArchiveEntry {
                path: value.to_string(),
                size: None,
                is_dir: false,
            }),
            "Size" => {
                if let Some(entry) = entries.last_mut() {
                    entry.size = value.trim().parse().ok();
                }
            }
            "Folder" => {
                if let Some(entry) = entries.last_mut() {
                    entry.is_dir = value.trim() == "+";
                }
            }
            "Attributes" => {
                if let Some(entry) = entries.last_mut() {
                    entry.is_dir |= value.trim_start().starts_with('D');
                }
            }
            _ => {}
        }
    }

    entries
}
