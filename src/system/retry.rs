// src/system/retry.rs

//! Retry wrapper for provider requests.
//!
//! Only throttling is retried. A throttled request is repeated after a fixed delay, with no limit on
//! the number of attempts, until it either succeeds or fails for another reason.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Delay between two attempts of a throttled request.
pub const DEFAULT_THROTTLE_DELAY: Duration = Duration::from_secs(5);

/// HTTP status code signalling throttling.
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Errors that can tell whether they were caused by throttling.
pub trait Throttling {
    /// `true` if the request was rejected for exceeding a rate limit.
    fn is_throttled(&self) -> bool;
}

/// A provider response with a non-success HTTP status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Request failed with HTTP status {status}: {message}")]
pub struct HttpStatusError {
    /// The HTTP status code.
    pub status: u16,
    /// The provider's message.
    pub message: String,
}

impl HttpStatusError {
    /// Creates an error for `status`.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl Throttling for HttpStatusError {
    fn is_throttled(&self) -> bool {
        self.status == TOO_MANY_REQUESTS
    }
}

/// How throttled requests are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed wait before each new attempt.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_THROTTLE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy waiting `delay` between attempts.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

/// Runs `request` until it succeeds or fails with a non-throttling error.
///
/// `request` is called once per attempt and must build a fresh future each time.
pub async fn persistent_request<T, E, F, Fut>(policy: RetryPolicy, mut request: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Throttling + fmt::Display,
{
    let mut attempt: u64 = 1;
    loop {
        match request().await {
            Err(e) if e.is_throttled() => {
                log::warn!(
                    "Request throttled ({}), retrying in {:?} (attempt {})",
                    e,
                    policy.delay,
                    attempt
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy::with_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = persistent_request(fast(), || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 3 {
                    Err(HttpStatusError::new(TOO_MANY_REQUESTS, "slow down"))
                } else {
                    Ok("deployed")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("deployed"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_other_errors_propagate_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), _> = persistent_request(fast(), || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(HttpStatusError::new(400, "bad request"))
            }
        })
        .await;

        assert_eq!(result, Err(HttpStatusError::new(400, "bad request")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_policy_waits_five_seconds() {
        assert_eq!(RetryPolicy::default().delay, Duration::from_secs(5));
    }
}
