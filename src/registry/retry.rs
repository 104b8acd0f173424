//! Exponential backoff for retryable registry failures

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::config::RegistryConfig;
use crate::registry::error::RegistryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(config.max_retries, config.retry_base_delay())
    }

    /// Backoff before retry number `attempt` (zero based): `base × 2^attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds, fails permanently or retries run out.
    ///
    /// A `RateLimited` error carrying a `Retry-After` value waits that long
    /// instead of the computed backoff.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, RegistryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RegistryError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = match &e {
                        RegistryError::RateLimited {
                            retry_after_secs: Some(secs),
                        } => Duration::from_secs(*secs),
                        _ => self.delay_for(attempt),
                    };
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                        label,
                        attempt + 1,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RegistryConfig::default())
    }
}
