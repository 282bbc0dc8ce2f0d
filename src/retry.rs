//! Retry logic with exponential backoff
//!
//! A failed attempt is retried from scratch after a delay that starts at
//! [`RetryConfig::initial_delay`] and grows by [`RetryConfig::backoff_multiplier`]
//! each time. Every wait races a [`CancellationToken`], so cancelling never has
//! to sit out a long backoff interval.
//!
//! # Example
//!
//! ```no_run
//! use wikidump_dl::retry::{Cancelled, IsRetryable, fetch_with_retry};
//! use wikidump_dl::config::RetryConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Cancelled,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! impl From<Cancelled> for MyError {
//!     fn from(_: Cancelled) -> Self {
//!         MyError::Cancelled
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let cancel = CancellationToken::new();
//! fetch_with_retry(&config, &cancel, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the operation should be attempted again
    fn is_retryable(&self) -> bool;
}

/// Marker produced when the cancellation token fires inside the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl From<Cancelled> for Error {
    fn from(_: Cancelled) -> Self {
        Error::Cancelled
    }
}

/// Implementation of IsRetryable for our Error type
///
/// Anything that can go wrong while downloading and storing one attempt is
/// retried, digest mismatches included: a flaky mirror may serve a corrupt body
/// once and a good one the next time.
impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network { .. } => true,
            Error::HttpStatus { .. } => true,
            Error::DigestMismatch { .. } => true,
            Error::Storage { .. } => true,
            Error::Cancelled => false,
            Error::UnknownResource { .. } => false,
            Error::Archive(_) => false,
            Error::Config { .. } => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// # Arguments
///
/// * `config` - Retry configuration (max attempts, delays, backoff multiplier, jitter)
/// * `cancel` - Token checked before every attempt and raced against every wait
/// * `operation` - Async closure that returns Result<T, E> where E implements IsRetryable
///
/// # Returns
///
/// The successful result, `E::from(Cancelled)` if the token fired, or the last
/// error once retries are exhausted or a non-retryable error occurred.
pub async fn fetch_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + From<Cancelled> + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay.min(config.max_delay);

    loop {
        if cancel.is_cancelled() {
            return Err(E::from(Cancelled));
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                let wait = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = wait.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::debug!(attempt = attempt, "Cancelled during backoff");
                        return Err(E::from(Cancelled));
                    }
                    _ = tokio::time::sleep(wait) => {}
                }

                // Negative, NaN or overflowing products saturate at the cap
                delay = Duration::try_from_secs_f64(
                    delay.as_secs_f64() * config.backoff_multiplier,
                )
                .unwrap_or(config.max_delay)
                .min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
