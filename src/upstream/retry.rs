//! Retry configuration, delay calculation, and the retrying source decorator.
//!
//! Provides [`RetryConfig`] for controlling backoff on rate-limited upstream
//! calls and [`RetryingSource`], an [`InventorySource`] decorator that
//! retries detail fetches. Listing pages pass straight through: pagination
//! is sequential and a failed page aborts the whole refresh.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::traits::{InventorySource, ItemDetail, ItemFilter, ItemPage};
use crate::Result;
use crate::telemetry;

/// Configuration for retry behaviour on rate-limited responses.
///
/// Uses exponential backoff: `initial_delay * 2^attempt`, capped at
/// `max_delay`.
///
/// ```rust
/// # use stockroom::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(3)
///     .initial_delay(Duration::from_secs(2));
/// assert_eq!(config.delay_for_attempt(1), Duration::from_secs(4));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3 (two retries).
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 2s.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 30s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new config with the defaults above.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the base delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// Uses exponential backoff: `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Calculate the effective delay, respecting provider `retry_after` hints.
    ///
    /// If a `retry_after` duration is provided (from a `RateLimited` error),
    /// it takes precedence over the calculated backoff.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.delay_for_attempt(attempt))
    }
}

/// Execute an async operation, retrying rate-limited failures.
///
/// Retries only [`StockroomError::RateLimited`](crate::StockroomError::RateLimited)
/// up to `config.max_attempts`; every other error is returned immediately.
/// After the last attempt the rate-limit error itself is returned.
pub(crate) async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    source_name: &str,
    subject: &str,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_rate_limited() && attempt + 1 < max_attempts => {
                let delay = config.effective_delay(attempt, e.retry_after());
                warn!(
                    source = source_name,
                    subject,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, retrying"
                );
                metrics::counter!(telemetry::DETAIL_RETRIES_TOTAL).increment(1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Decorator that retries rate-limited detail fetches of an
/// [`InventorySource`].
pub struct RetryingSource {
    inner: Arc<dyn InventorySource>,
    config: RetryConfig,
}

impl RetryingSource {
    /// Wrap a source with retry logic.
    pub fn new(inner: Arc<dyn InventorySource>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl InventorySource for RetryingSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list_page(&self, filter: &ItemFilter, page: u32) -> Result<ItemPage> {
        self.inner.list_page(filter, page).await
    }

    async fn fetch_detail(&self, item_id: &str) -> Result<ItemDetail> {
        with_retry(&self.config, self.inner.name(), item_id, || {
            self.inner.fetch_detail(item_id)
        })
        .await
    }
}
