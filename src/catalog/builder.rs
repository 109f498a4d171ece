//! Builder for configuring catalog instances

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::{Catalog, ViewConfig};
use crate::refresh::{DependentKeys, FreshnessPolicy, RefreshConfig, RefreshOrchestrator};
use crate::snapshot::Snapshot;
use crate::store::{CacheKeys, CacheStore, DEFAULT_PREFIX, MemoryStore};
use crate::upstream::InventorySource;
use crate::{Result, StockroomError};

/// Main entry point for creating catalog instances.
pub struct Stockroom;

impl Stockroom {
    /// Create a new builder for configuring the catalog.
    pub fn builder() -> StockroomBuilder {
        StockroomBuilder::new()
    }
}

/// Builder for configuring catalog instances.
pub struct StockroomBuilder {
    source: Option<Arc<dyn InventorySource>>,
    store: Option<Arc<dyn CacheStore>>,
    snapshot_path: Option<PathBuf>,
    key_prefix: String,
    hard_ttl: Duration,
    soft_ttl: Duration,
    refresh: RefreshConfig,
    views: ViewConfig,
    cold_poll_interval: Duration,
}

impl Default for StockroomBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StockroomBuilder {
    pub fn new() -> Self {
        let policy = FreshnessPolicy::default();
        Self {
            source: None,
            store: None,
            snapshot_path: None,
            key_prefix: DEFAULT_PREFIX.to_string(),
            hard_ttl: policy.hard_ttl(),
            soft_ttl: policy.soft_ttl(),
            refresh: RefreshConfig::default(),
            views: ViewConfig::default(),
            cold_poll_interval: Duration::from_secs(1),
        }
    }

    /// Set the inventory source (required).
    pub fn source(mut self, source: Arc<dyn InventorySource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the shared cache store (default: an in-process [`MemoryStore`]).
    pub fn store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Enable the on-disk snapshot at `path`.
    pub fn snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Set the cache key prefix (default: `"zoho"`).
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the hard and soft TTLs of the catalog entry.
    pub fn freshness(mut self, hard_ttl: Duration, soft_ttl: Duration) -> Self {
        self.hard_ttl = hard_ttl;
        self.soft_ttl = soft_ttl;
        self
    }

    /// Set the refresh settings.
    pub fn refresh(mut self, config: RefreshConfig) -> Self {
        self.refresh = config;
        self
    }

    /// Set the ingredients/services view settings.
    pub fn views(mut self, config: ViewConfig) -> Self {
        self.views = config;
        self
    }

    /// How often a cold reader waiting on another replica's refresh checks
    /// the store (default: 1s).
    pub fn cold_poll_interval(mut self, interval: Duration) -> Self {
        self.cold_poll_interval = interval;
        self
    }

    /// Build the catalog.
    ///
    /// Fails if no source is configured or any setting is out of range.
    pub fn build(self) -> Result<Catalog> {
        let source = self.source.ok_or_else(|| {
            StockroomError::Configuration("no inventory source configured".to_string())
        })?;
        if self.key_prefix.is_empty() {
            return Err(StockroomError::Configuration(
                "cache key prefix must not be empty".to_string(),
            ));
        }
        if self.cold_poll_interval.is_zero() {
            return Err(StockroomError::Configuration(
                "cold poll interval must be greater than zero".to_string(),
            ));
        }
        let policy = FreshnessPolicy::new(self.hard_ttl, self.soft_ttl)?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn CacheStore>);
        let keys = CacheKeys::new(self.key_prefix);
        let dependents = DependentKeys::new().with_key(keys.ingredients());

        let orchestrator = RefreshOrchestrator::new(
            store,
            source,
            self.snapshot_path.map(Snapshot::new),
            keys,
            policy,
            self.refresh,
            dependents,
        )?;

        Ok(Catalog::new(
            Arc::new(orchestrator),
            self.views,
            self.cold_poll_interval,
        ))
    }
}
