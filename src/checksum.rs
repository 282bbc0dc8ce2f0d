//! Single-pass copy with content hashing
//!
//! Bytes are hashed as they are written to the sink, so a download is read
//! exactly once and the digest always describes what landed on disk.

use crate::types::DigestAlgorithm;
use sha1::Digest as _;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Incremental hasher for one of the supported digest algorithms
pub enum ContentHasher {
    /// MD5 state
    Md5(md5::Context),
    /// SHA-1 state
    Sha1(sha1::Sha1),
    /// SHA-256 state
    Sha256(sha2::Sha256),
}

impl ContentHasher {
    /// Fresh hasher for `algorithm`
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Md5 => ContentHasher::Md5(md5::Context::new()),
            DigestAlgorithm::Sha1 => ContentHasher::Sha1(sha1::Sha1::new()),
            DigestAlgorithm::Sha256 => ContentHasher::Sha256(sha2::Sha256::new()),
        }
    }

    /// Feed bytes into the hash
    pub fn update(&mut self, data: &[u8]) {
        match self {
            ContentHasher::Md5(ctx) => ctx.consume(data),
            ContentHasher::Sha1(h) => h.update(data),
            ContentHasher::Sha256(h) => h.update(data),
        }
    }

    /// Finish and render the digest as lowercase hex
    pub fn finalize_hex(self) -> String {
        match self {
            ContentHasher::Md5(ctx) => format!("{:x}", ctx.compute()),
            ContentHasher::Sha1(h) => format!("{:x}", h.finalize()),
            ContentHasher::Sha256(h) => format!("{:x}", h.finalize()),
        }
    }
}

/// Result of a completed [`copy_and_hash`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOutcome {
    /// Number of bytes copied
    pub bytes: u64,
    /// Lowercase hex digest of the copied bytes
    pub digest: String,
}

/// Which side of a [`copy_and_hash`] failed
///
/// Source failures are transport problems, sink failures are storage problems;
/// the caller attaches the URL or the spool path accordingly.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    /// Reading from the source failed
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),
    /// Writing to or flushing the sink failed
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),
}

/// Copy `source` into `sink` until EOF, hashing every byte written
///
/// The sink is flushed before returning. Any read or write error aborts the copy
/// and is returned unchanged, tagged with the side it came from.
pub async fn copy_and_hash<R, W>(
    source: &mut R,
    sink: &mut W,
    algorithm: DigestAlgorithm,
) -> Result<CopyOutcome, CopyError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut hasher = ContentHasher::new(algorithm);
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut bytes = 0u64;

    loop {
        let n = source.read(&mut buffer).await.map_err(CopyError::Read)?;
        if n == 0 {
            break;
        }
        sink.write_all(&buffer[..n])
            .await
            .map_err(CopyError::Write)?;
        hasher.update(&buffer[..n]);
        bytes += n as u64;
    }
    sink.flush().await.map_err(CopyError::Write)?;

    Ok(CopyOutcome {
        bytes,
        digest: hasher.finalize_hex(),
    })
}

/// Compare a computed digest with the expected one, ignoring hex case
pub fn digest_matches(expected: &str, actual: &str) -> bool {
    actual.eq_ignore_ascii_case(expected)
}
