//! 7z solid archive handling
//!
//! A `.7z` dump cannot be decoded as a stream: the archive header sits at the
//! end of the file. The downloaded spool file is therefore handed to a backend
//! by path, which lists it and opens its one entry for reading.
//!
//! ## Architecture
//!
//! The core abstraction is the [`SolidArchive`] trait. Two implementations are
//! provided:
//!
//! - [`CliSevenZip`]: Runs an external `7z`, `7za` or `7zz` binary
//! - [`NativeSevenZip`]: Decodes in-process with `sevenz-rust`
//!
//! [`resolve_backend`] picks one according to [`ToolsConfig`].
//!
//! ## Usage
//!
//! ```no_run
//! use wikidump_dl::archive::{resolve_backend, SolidArchive};
//! use wikidump_dl::config::ToolsConfig;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = resolve_backend(&ToolsConfig::default())?;
//!     let entries = backend.list_entries(Path::new("dump.xml.7z")).await?;
//!     println!("{} lists {} entries", backend.name(), entries.len());
//!     Ok(())
//! }
//! ```

mod cli;
mod native;
mod traits;

pub use cli::{CliSevenZip, parse_slt_listing};
pub use native::NativeSevenZip;
pub use traits::{ArchiveEntry, EntryReader, SolidArchive};

use crate::config::{ArchiveBackendKind, ToolsConfig};
use crate::error::{ArchiveError, Result};
use std::sync::Arc;

/// Locate the external 7z binary allowed by `tools`
///
/// An explicit `sevenzip_path` wins; otherwise PATH is searched when
/// `search_path` is set.
pub fn find_external(tools: &ToolsConfig) -> Option<CliSevenZip> {
    if let Some(path) = &tools.sevenzip_path {
        return Some(CliSevenZip::new(path.clone()));
    }
    if tools.search_path {
        return CliSevenZip::from_path();
    }
    None
}

/// Build the archive backend selected by `tools`
///
/// # Errors
///
/// Returns [`ArchiveError::ToolNotFound`] when the external backend is required
/// but no binary is configured or found.
pub fn resolve_backend(tools: &ToolsConfig) -> Result<Arc<dyn SolidArchive>> {
    let backend: Arc<dyn SolidArchive> = match tools.archive_backend {
        ArchiveBackendKind::Native => Arc::new(NativeSevenZip::new()),
        ArchiveBackendKind::External => match find_external(tools) {
            Some(cli) => Arc::new(cli),
            None => {
                return Err(ArchiveError::ToolNotFound {
                    tool: "7z".to_string(),
                }
                .into());
            }
        },
        ArchiveBackendKind::Auto => match find_external(tools) {
            Some(cli) => Arc::new(cli),
            None => {
                tracing::info!("No 7z binary found, using the in-process decoder");
                Arc::new(NativeSevenZip::new())
            }
        },
    };

    tracing::debug!(backend = backend.name(), "Resolved 7z backend");
    Ok(backend)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::path::PathBuf;

    fn tools(kind: ArchiveBackendKind, path: Option<&str>, search: bool) -> ToolsConfig {
        ToolsConfig {
            sevenzip_path: path.map(PathBuf::from),
            search_path: search,
            archive_backend: kind,
        }
    }

    #[test]
    fn native_is_always_available() {
        let backend = resolve_backend(&tools(ArchiveBackendKind::Native, None, false)).unwrap();
        assert_eq!(backend.name(), "native-7z");
    }

    #[test]
    fn explicit_path_selects_cli_backend() {
        let config = tools(ArchiveBackendKind::External, Some("/opt/7zip/7zz"), false);

        assert_eq!(
            find_external(&config).unwrap().binary_path(),
            PathBuf::from("/opt/7zip/7zz")
        );
        assert_eq!(resolve_backend(&config).unwrap().name(), "cli-7z");
    }

    #[test]
    fn external_without_path_or_search_is_not_found() {
        let err = resolve_backend(&tools(ArchiveBackendKind::External, None, false))
            .err()
            .unwrap();

        assert!(matches!(
            err,
            Error::Archive(ArchiveError::ToolNotFound { .. })
        ));
        assert_eq!(err.error_code(), "archive_tool_not_found");
    }

    #[test]
    fn auto_falls_back_to_native_without_search() {
        let backend = resolve_backend(&tools(ArchiveBackendKind::Auto, None, false)).unwrap();
        assert_eq!(backend.name(), "native-7z");
    }

    #[test]
    fn auto_prefers_binary_found_in_path() {
        let expected = if CliSevenZip::from_path().is_some() {
            "cli-7z"
        } else {
            "native-7z"
        };
        let backend = resolve_backend(&tools(ArchiveBackendKind::Auto, None, true)).unwrap();
        assert_eq!(backend.name(), expected);
    }
}
