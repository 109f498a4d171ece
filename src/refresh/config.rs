//! Freshness and refresh settings.

use std::time::Duration;

use crate::upstream::RetryConfig;
use crate::{Result, StockroomError};

/// Hard/soft TTL pair for the catalog cache entry.
///
/// The hard TTL is the absolute expiry of the cached item set; the soft TTL
/// is the age after which a read still serves the entry but schedules a
/// background refresh. `soft_ttl < hard_ttl` always holds for a built policy.
///
/// ```rust
/// # use stockroom::FreshnessPolicy;
/// # use std::time::Duration;
/// let policy = FreshnessPolicy::new(Duration::from_secs(3600), Duration::from_secs(600)).unwrap();
/// assert!(policy.is_stale(Duration::from_secs(601)));
/// assert!(FreshnessPolicy::new(Duration::from_secs(60), Duration::from_secs(60)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    hard_ttl: Duration,
    soft_ttl: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            hard_ttl: Duration::from_secs(3600),
            soft_ttl: Duration::from_secs(600),
        }
    }
}

impl FreshnessPolicy {
    /// Build a policy, rejecting `soft_ttl >= hard_ttl` and a zero soft TTL.
    pub fn new(hard_ttl: Duration, soft_ttl: Duration) -> Result<Self> {
        if soft_ttl.is_zero() {
            return Err(StockroomError::Configuration(
                "soft TTL must be greater than zero".to_string(),
            ));
        }
        if soft_ttl >= hard_ttl {
            return Err(StockroomError::Configuration(format!(
                "soft TTL ({}s) must be shorter than hard TTL ({}s)",
                soft_ttl.as_secs_f64(),
                hard_ttl.as_secs_f64()
            )));
        }
        Ok(Self { hard_ttl, soft_ttl })
    }

    pub fn hard_ttl(&self) -> Duration {
        self.hard_ttl
    }

    pub fn soft_ttl(&self) -> Duration {
        self.soft_ttl
    }

    /// Whether an entry of this age should be refreshed behind the reader.
    pub fn is_stale(&self, age: Duration) -> bool {
        age > self.soft_ttl
    }
}

/// Settings for one refresh attempt.
///
/// Defaults keep detail fetches around 85 requests per minute, under the
/// provider's 100/minute budget.
///
/// ```rust
/// # use stockroom::RefreshConfig;
/// # use std::time::Duration;
/// let config = RefreshConfig::new()
///     .batch_size(10)
///     .batch_pause(Duration::from_secs(5))
///     .kit_categories(["wine", "mead"]);
/// assert_eq!(config.kit_categories, vec!["wine", "mead"]);
/// ```
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Refresh target name; the lock key is derived from it.
    /// Default: `"products:refresh"`.
    pub target: String,
    /// Lifetime of the refresh lock if never released. Default: 120s.
    pub lock_ttl: Duration,
    /// Detail fetches issued concurrently per batch. Default: 5.
    pub batch_size: usize,
    /// Fixed pause between batches. Default: 3.5s.
    pub batch_pause: Duration,
    /// Backoff for rate-limited detail fetches.
    pub retry: RetryConfig,
    /// Custom field label holding the product type. Default: `"Type"`.
    pub type_label: String,
    /// Product types (case-insensitive) that make an item a kit.
    /// Default: wine, beer, cider, seltzer.
    pub kit_categories: Vec<String>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            target: "products:refresh".to_string(),
            lock_ttl: Duration::from_secs(120),
            batch_size: 5,
            batch_pause: Duration::from_millis(3500),
            retry: RetryConfig::default(),
            type_label: "Type".to_string(),
            kit_categories: ["wine", "beer", "cider", "seltzer"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl RefreshConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lock TTL.
    pub fn lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Set the number of concurrent detail fetches per batch.
    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    /// Set the pause between batches.
    pub fn batch_pause(mut self, pause: Duration) -> Self {
        self.batch_pause = pause;
        self
    }

    /// Set the detail-fetch retry policy.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the custom field label holding the product type.
    pub fn type_label(mut self, label: impl Into<String>) -> Self {
        self.type_label = label.into();
        self
    }

    /// Replace the kit category allow-list.
    pub fn kit_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kit_categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(StockroomError::Configuration(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.lock_ttl.is_zero() {
            return Err(StockroomError::Configuration(
                "lock TTL must be greater than zero".to_string(),
            ));
        }
        if self.kit_categories.is_empty() {
            return Err(StockroomError::Configuration(
                "at least one kit category is required".to_string(),
            ));
        }
        Ok(())
    }
}
