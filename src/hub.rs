//! Caller-facing entry point: named dumps as sequences of decompressed streams
//!
//! A [`DumpHub`] maps a logical dump name to its ordered resources. Opening a
//! name yields a [`ResourceStream`] that fetches, verifies and decompresses one
//! resource per call to [`ResourceStream::next`]. The first failure is sticky:
//! every later call hands back the same error.

use crate::archive::{SolidArchive, resolve_backend};
use crate::config::Config;
use crate::decompress::{self, DumpStream};
use crate::error::{Error, Result};
use crate::fetch::{Fetcher, http};
use crate::types::{Catalog, ResourceDescriptor};
use chrono::NaiveDate;
use futures::Stream;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Access point to the dumps of one date
///
/// Cheap to clone: the catalog, HTTP client and archive backend are shared.
#[derive(Clone)]
pub struct DumpHub {
    catalog: Arc<Catalog>,
    date: NaiveDate,
    fetcher: Fetcher,
    archive: Arc<dyn SolidArchive>,
}

impl DumpHub {
    /// Create a hub over `catalog`
    ///
    /// Creates the spool directory if needed, builds the HTTP client and picks
    /// the 7z backend selected in `config.tools`.
    ///
    /// # Errors
    ///
    /// Fails when `config` does not validate, the spool directory cannot be
    /// created, the HTTP client cannot be built, or an external 7z tool is
    /// required but not found.
    pub fn new(catalog: Catalog, date: NaiveDate, config: Config) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.spool_dir).map_err(|e| {
            Error::storage("unable to create spool directory", &config.spool_dir, e)
        })?;

        let client = http::build_client(&config.http)?;
        let archive = resolve_backend(&config.tools)?;
        let fetcher = Fetcher::new(client, config.spool_dir, config.retry);

        tracing::debug!(
            %date,
            names = catalog.len(),
            spool_dir = %fetcher.spool_dir().display(),
            backend = archive.name(),
            "Dump hub created"
        );

        Ok(Self {
            catalog: Arc::new(catalog),
            date,
            fetcher,
            archive,
        })
    }

    /// Replace the 7z backend
    pub fn with_archive_backend(mut self, archive: Arc<dyn SolidArchive>) -> Self {
        self.archive = archive;
        self
    }

    /// Date of the dumps this hub serves
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Registered dump names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.catalog.names().collect();
        names.sort_unstable();
        names
    }

    /// The catalog this hub resolves names against
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Check that every name in `names` is registered
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownResource`] for the first missing name.
    pub fn check_for(&self, names: &[&str]) -> Result<()> {
        match names.iter().find(|name| !self.catalog.contains(name)) {
            Some(missing) => Err(Error::UnknownResource {
                name: missing.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Open the ordered resources registered under `name`
    ///
    /// Never fails directly: an unknown name yields a stream whose every call
    /// returns [`Error::UnknownResource`].
    pub fn open(&self, name: &str) -> ResourceStream {
        let state = match self.catalog.get(name) {
            Some(resources) => StreamState::Pending(resources.iter().cloned().collect()),
            None => {
                tracing::warn!(name, "Unknown dump name requested");
                StreamState::Failed(Error::UnknownResource {
                    name: name.to_string(),
                })
            }
        };

        ResourceStream {
            hub: self.clone(),
            name: name.to_string(),
            state,
        }
    }

    async fn open_resource(
        &self,
        descriptor: &ResourceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<DumpStream> {
        let spooled = self.fetcher.fetch(descriptor, cancel).await?;
        decompress::open(
            spooled,
            descriptor.compression(),
            self.archive.as_ref(),
            descriptor.url(),
        )
        .await
    }
}

impl fmt::Debug for DumpHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DumpHub")
            .field("date", &self.date)
            .field("names", &self.catalog.len())
            .field("spool_dir", &self.fetcher.spool_dir())
            .field("backend", &self.archive.name())
            .finish()
    }
}

#[derive(Debug)]
enum StreamState {
    Pending(VecDeque<ResourceDescriptor>),
    // A `next` future was polled but never completed
    InProgress { url: String },
    Exhausted,
    Failed(Error),
}

/// Sequential iterator over the resources of one dump name
///
/// Resources are handed out in catalog order, each at most once. `Ok(None)`
/// marks the end of the sequence and repeats forever. After the first error the
/// iterator is failed for good.
#[derive(Debug)]
pub struct ResourceStream {
    hub: DumpHub,
    name: String,
    state: StreamState,
}

impl ResourceStream {
    /// Dump name this stream was opened for
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether further calls to [`next`](Self::next) can only repeat the end or
    /// an earlier error
    pub fn is_finished(&self) -> bool {
        !matches!(self.state, StreamState::Pending(_))
    }

    /// Number of resources not handed out yet
    pub fn remaining(&self) -> usize {
        match &self.state {
            StreamState::Pending(queue) => queue.len(),
            _ => 0,
        }
    }

    /// Fetch, verify and decompress the next resource
    ///
    /// The resource is consumed whether or not this succeeds. Callers should
    /// close the previous [`DumpStream`] before asking for the next one so its
    /// spool file is gone first.
    ///
    /// Dropping the returned future before it completes (a timeout, a lost
    /// `select!` branch) abandons the resource: the next call fails with
    /// [`Error::Cancelled`] instead of skipping ahead to the following one.
    ///
    /// # Errors
    ///
    /// The first error moves the stream into a failed state; it is returned
    /// again on every later call.
    pub async fn next(&mut self, cancel: &CancellationToken) -> Result<Option<DumpStream>> {
        let (descriptor, rest) = match std::mem::replace(&mut self.state, StreamState::Exhausted) {
            StreamState::Failed(e) => {
                self.state = StreamState::Failed(e.clone());
                return Err(e);
            }
            StreamState::Exhausted => return Ok(None),
            StreamState::InProgress { url } => {
                tracing::warn!(name = %self.name, url = %url, "Previous fetch was abandoned before completing");
                self.state = StreamState::Failed(Error::Cancelled);
                return Err(Error::Cancelled);
            }
            StreamState::Pending(mut queue) => match queue.pop_front() {
                Some(descriptor) => (descriptor, queue),
                None => {
                    tracing::debug!(name = %self.name, "All resources consumed");
                    return Ok(None);
                }
            },
        };

        self.state = StreamState::InProgress {
            url: descriptor.url().to_string(),
        };

        tracing::debug!(name = %self.name, url = descriptor.url(), "Opening next resource");
        match self.hub.open_resource(&descriptor, cancel).await {
            Ok(stream) => {
                tracing::info!(name = %self.name, url = descriptor.url(), "Resource ready");
                self.state = StreamState::Pending(rest);
                Ok(Some(stream))
            }
            Err(e) => {
                tracing::error!(name = %self.name, url = descriptor.url(), error = %e, "Resource stream failed");
                self.state = StreamState::Failed(e.clone());
                Err(e)
            }
        }
    }

    /// Adapt into a [`Stream`] that ends after the last resource or the first
    /// error
    pub fn into_stream(
        self,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<DumpStream>> + Send {
        futures::stream::unfold(Some(self), move |state| {
            let cancel = cancel.clone();
            async move {
                let mut resources = state?;
                match resources.next(&cancel).await {
                    Ok(Some(stream)) => Some((Ok(stream), Some(resources))),
                    Ok(None) => None,
                    Err(e) => Some((Err(e), None)),
                }
            }
        })
    }
}
