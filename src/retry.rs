//! Exponential backoff with error classification.
//!
//! Every venue call goes through [`with_retry`]. Errors are sorted into
//! three classes: ignorable outcomes that already mean success (cancelling
//! an order that is gone), transient failures worth another attempt, and
//! everything else, which propagates immediately.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::config::RetryConfig;
use crate::error::{HypercopyError, Result};

/// How an error should be treated by the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Ignore,
    Retry,
    Fatal,
}

pub type Classifier = fn(&HypercopyError) -> ErrorClass;

const RETRYABLE_MARKERS: &[&str] = &["rate limit", "timeout", "timed out", "connection"];

/// Default classification for mutations.
pub fn classify_error(err: &HypercopyError) -> ErrorClass {
    match err {
        HypercopyError::RateLimited(_)
        | HypercopyError::Timeout(_)
        | HypercopyError::Connection(_) => return ErrorClass::Retry,
        HypercopyError::Http(e) if e.is_timeout() || e.is_connect() => return ErrorClass::Retry,
        HypercopyError::Venue { status, .. } if *status >= 500 => return ErrorClass::Retry,
        // Only a per-order cancel status can mean the order is already gone.
        HypercopyError::OrderGone(_) => return ErrorClass::Ignore,
        HypercopyError::Venue { .. }
        | HypercopyError::CancelRejected(_)
        | HypercopyError::InvalidOrder(_)
        | HypercopyError::InvalidIntent(_)
        | HypercopyError::UnknownTrader(_)
        | HypercopyError::CredentialMissing { .. } => return ErrorClass::Fatal,
        _ => {}
    }

    let text = err.to_string().to_lowercase();
    if RETRYABLE_MARKERS.iter().any(|m| text.contains(m)) {
        ErrorClass::Retry
    } else {
        ErrorClass::Fatal
    }
}

/// Classification for reads: transient failures retry, nothing is ignorable.
pub fn classify_transient(err: &HypercopyError) -> ErrorClass {
    match classify_error(err) {
        ErrorClass::Ignore => ErrorClass::Fatal,
        class => class,
    }
}

/// Outcome of a retried operation that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retried<T> {
    Completed(T),
    /// The venue reported a condition classified as ignorable; carries its message
    Ignored(String),
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    classify: Classifier,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            classify: classify_error,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
        )
    }

    /// Same schedule, transient-only classification.
    pub fn for_reads(&self) -> Self {
        self.clone().with_classifier(classify_transient)
    }

    pub fn with_classifier(mut self, classify: Classifier) -> Self {
        self.classify = classify;
        self
    }

    pub fn classify(&self, err: &HypercopyError) -> ErrorClass {
        (self.classify)(err)
    }

    /// Backoff before the attempt following `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Run `op` under `policy`.
///
/// Retryable failures sleep `base_delay * 2^attempt` and try again until
/// `max_attempts` is reached, after which the last error propagates.
/// Ignorable failures return [`Retried::Ignored`] at once.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<Retried<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(Retried::Completed(value)),
            Err(err) => match policy.classify(&err) {
                ErrorClass::Ignore => {
                    debug!("{}: ignoring venue response: {}", label, err);
                    return Ok(Retried::Ignored(err.to_string()));
                }
                ErrorClass::Retry if attempt + 1 < policy.max_attempts => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        "{} attempt {} failed: {}. Retrying in {:?}",
                        label,
                        attempt + 1,
                        err,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                ErrorClass::Retry => {
                    error!("{} failed after {} attempts: {}", label, attempt + 1, err);
                    return Err(err);
                }
                ErrorClass::Fatal => {
                    debug!("{} failed with non-retryable error: {}", label, err);
                    return Err(err);
                }
            },
        }
    }
}

impl<T> Retried<T> {
    /// Treat an ignorable outcome as an error for callers that need a value.
    pub fn into_value(self) -> Result<T> {
        match self {
            Retried::Completed(value) => Ok(value),
            Retried::Ignored(msg) => Err(HypercopyError::Internal(format!(
                "unexpected ignorable response: {msg}"
            ))),
        }
    }
}
