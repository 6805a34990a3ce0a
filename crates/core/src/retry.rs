//! Retry policy for transient transport failures.
//!
//! Transient errors (reset connections, truncated or undecodable bodies) are
//! retried in place without sleeping. The attempt cap exists so tests and
//! pathological peers cannot hang a loop forever; in production it is set high
//! enough to behave as "until it works".

use std::future::Future;

use tracing::{trace, warn};

/// Errors that can tell whether retrying the same call is worthwhile.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// How many times a transient failure is retried before it is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1_000_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Run `op` until it succeeds, fails permanently, or the cap is reached.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        E: Transient + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    trace!(label, attempt, error = %e, "Transient failure, retrying");
                    attempt += 1;
                    tokio::task::yield_now().await;
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(label, attempt, error = %e, "Giving up after transient failures");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use thiserror::Error;

    #[derive(Debug, Error)]
    enum FakeError {
        #[error("reset")]
        Reset,
        #[error("denied")]
        Denied,
    }

    impl Transient for FakeError {
        fn is_transient(&self) -> bool {
            matches!(self, FakeError::Reset)
        }
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<u32, FakeError> = RetryPolicy::default()
            .run("test", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 3 {
                    Err(FakeError::Reset)
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), FakeError> = RetryPolicy::default()
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FakeError::Denied)
            })
            .await;
        assert!(matches!(result, Err(FakeError::Denied)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_cap_surfaces_transient_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), FakeError> = RetryPolicy::new(5)
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FakeError::Reset)
            })
            .await;
        assert!(matches!(result, Err(FakeError::Reset)));
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }
}
