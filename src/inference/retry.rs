use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, info, warn};

/// Backoff never grows past this, regardless of attempt count.
const MAX_BACKOFF: Duration = Duration::from_secs(30);
/// Attempt budget for errors the classifier considers fatal.
const FATAL_ATTEMPTS: u32 = 2;

/// Retry with capped exponential backoff and jitter, applied uniformly at
/// each external-call boundary (store, inference, chat transport).
///
/// Transport-class failures (connection resets, TLS, timeouts) get the
/// full attempt budget; anything else is likely a real error and gets at
/// most [`FATAL_ATTEMPTS`] so it surfaces quickly.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Signatures that mark an error as transient infrastructure trouble.
    /// Matched against the error's display text, lowercased.
    pub fn is_transient(message: &str) -> bool {
        const SIGNATURES: &[&str] = &[
            "connection reset",
            "connection refused",
            "connection closed",
            "broken pipe",
            "tls",
            "handshake",
            "timed out",
            "timeout",
            "temporarily unavailable",
            "too many requests",
            "429",
            "502",
            "503",
            "504",
        ];
        let message = message.to_ascii_lowercase();
        SIGNATURES.iter().any(|s| message.contains(s))
    }

    /// Run `op` until it succeeds or the attempt budget for its error
    /// class runs out. The final error is returned unchanged.
    pub async fn run<T, E, F, Fut>(&self, label: &str, op: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(label, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    let budget = if Self::is_transient(&e.to_string()) {
                        self.max_attempts
                    } else {
                        self.max_attempts.min(FATAL_ATTEMPTS)
                    };

                    if attempt >= budget {
                        error!(label, attempt, "giving up: {e}");
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after error: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Exponential backoff with up to 25% random jitter.
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .min(MAX_BACKOFF);
        let jitter = exp.mul_f64(rand::thread_rng().gen_range(0.0..0.25));
        exp + jitter
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}
