//! Bounded retry local to a single provider call

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::config::NetworkSpec;
use crate::error::ProviderError;

const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_network(network: &NetworkSpec) -> Self {
        Self {
            max_retries: network.max_retries,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// No sleeping between attempts
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Duration::ZERO,
        }
    }

    /// Run `op`, repeating it on retryable failures with linear backoff.
    ///
    /// The same call is repeated; there is no path to another strategy from here.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Result<T, ProviderError>,
    {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.kind.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        strategy = err.strategy,
                        attempt,
                        max = self.max_retries,
                        "{} failed, retrying: {}",
                        what,
                        err.message
                    );
                    thread::sleep(self.backoff * attempt);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorKind;

    fn err(kind: ProviderErrorKind) -> ProviderError {
        ProviderError::new("listing:api", kind, "boom")
    }

    #[test]
    fn retries_network_errors_up_to_limit() {
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::immediate(2).run("fetch", || {
            calls += 1;
            Err(err(ProviderErrorKind::NetworkError))
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn succeeds_after_transient_failure() {
        let mut calls = 0;
        let result = RetryPolicy::immediate(2).run("fetch", || {
            calls += 1;
            if calls == 1 {
                Err(err(ProviderErrorKind::NetworkError))
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 2);
    }

    #[test]
    fn does_not_retry_quota() {
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::immediate(5).run("fetch", || {
            calls += 1;
            Err(err(ProviderErrorKind::Quota))
        });
        assert_eq!(result.unwrap_err().kind, ProviderErrorKind::Quota);
        assert_eq!(calls, 1);
    }
}
