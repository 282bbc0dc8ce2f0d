//! Core types: resource descriptors, the named catalog, and format tags

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One fetchable dump file and the digest its content must hash to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    url: String,
    digest: String,
}

impl ResourceDescriptor {
    /// Create a descriptor for `url` whose content hashes to `digest` (hex)
    pub fn new(url: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            digest: digest.into(),
        }
    }

    /// URL the resource is fetched from
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Expected hex digest of the downloaded bytes
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Hash algorithm implied by the digest
    ///
    /// Fails with [`Error::Config`] when the digest is not hex or has a length no
    /// supported algorithm produces.
    pub fn algorithm(&self) -> Result<DigestAlgorithm> {
        if !self.digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::config(
                format!("digest for {} is not hex: {}", self.url, self.digest),
                Some("digest"),
            ));
        }
        DigestAlgorithm::from_hex_len(self.digest.len()).ok_or_else(|| {
            Error::config(
                format!(
                    "digest for {} has unsupported length {}",
                    self.url,
                    self.digest.len()
                ),
                Some("digest"),
            )
        })
    }

    /// Container format implied by the URL
    pub fn compression(&self) -> Compression {
        Compression::from_url(&self.url)
    }

    /// Last path segment of the URL, used to name spool files
    pub fn file_name(&self) -> String {
        let path = url::Url::parse(&self.url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| self.url.clone());
        path.rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or("download")
            .to_string()
    }
}

/// Content hash algorithms accepted in descriptors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// 128-bit MD5 (32 hex chars)
    Md5,
    /// 160-bit SHA-1 (40 hex chars)
    Sha1,
    /// 256-bit SHA-256 (64 hex chars)
    Sha256,
}

impl DigestAlgorithm {
    /// Pick the algorithm whose hex digest has `len` characters
    pub fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            32 => Some(DigestAlgorithm::Md5),
            40 => Some(DigestAlgorithm::Sha1),
            64 => Some(DigestAlgorithm::Sha256),
            _ => None,
        }
    }
}

/// Container format of a resource, detected from its URL suffix
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    /// Served as-is
    None,
    /// `.gz`
    Gzip,
    /// `.bz2`
    Bzip2,
    /// `.7z` (solid archive holding a single entry)
    SevenZip,
}

impl Compression {
    /// Detect the container from the URL path, ignoring query and fragment
    pub fn from_url(url: &str) -> Self {
        let path = url::Url::parse(url)
            .map(|u| u.path().to_ascii_lowercase())
            .unwrap_or_else(|_| url.to_ascii_lowercase());

        if path.ends_with(".7z") {
            Compression::SevenZip
        } else if path.ends_with(".bz2") {
            Compression::Bzip2
        } else if path.ends_with(".gz") {
            Compression::Gzip
        } else {
            Compression::None
        }
    }
}

/// Mapping from logical dump name to its ordered resources
///
/// Order within a name matters: multi-part dumps are consumed part by part.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    entries: HashMap<String, Vec<ResourceDescriptor>>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the ordered resources for `name`, replacing any previous entry
    pub fn insert(&mut self, name: impl Into<String>, resources: Vec<ResourceDescriptor>) {
        self.entries.insert(name.into(), resources);
    }

    /// Resources registered for `name`, in consumption order
    pub fn get(&self, name: &str) -> Option<&[ResourceDescriptor]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, in no particular order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of registered names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no names are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<ResourceDescriptor>)> for Catalog {
    fn from_iter<I: IntoIterator<Item = (S, Vec<ResourceDescriptor>)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(name, resources)| (name.into(), resources))
                .collect(),
        }
    }
}
