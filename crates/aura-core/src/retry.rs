//! Bounded retry with exponential backoff for external calls.
//!
//! Every model and social-network call goes through [`RetryPolicy::run`].
//! Only errors that report themselves as transient are retried; anything
//! else is returned immediately.

use std::future::Future;
use std::time::Duration;

use aura_types::config::RetryConfig;
use aura_types::error::SocialError;
use aura_types::llm::LlmError;

/// Errors that know whether a retry may succeed.
pub trait Transient {
    fn is_transient(&self) -> bool;

    /// Server-suggested wait before retrying, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Transient for LlmError {
    fn is_transient(&self) -> bool {
        LlmError::is_transient(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after_ms().map(Duration::from_millis)
    }
}

impl Transient for SocialError {
    fn is_transient(&self) -> bool {
        SocialError::is_transient(self)
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before attempt `attempt + 1`, where `attempt` is 1-based.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, E, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T, E>
    where
        E: Transient + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = e
                        .retry_after()
                        .map(|d| d.min(self.max_delay))
                        .unwrap_or_else(|| self.backoff(attempt));
                    tracing::warn!(
                        op = op_name,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }
}
