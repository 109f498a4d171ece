//! Dependent-cache invalidation.

use futures_util::future::join_all;
use tracing::debug;

use crate::store::CacheStore;

/// Cache keys whose contents are a function of the current classification.
///
/// After every successful refresh all of them are deleted, whether or not the
/// classification actually changed; the next reader recomputes.
#[derive(Debug, Clone, Default)]
pub struct DependentKeys {
    keys: Vec<String>,
}

impl DependentKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dependent key. Duplicates are ignored.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
        self
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Delete every registered key.
    pub async fn invalidate(&self, store: &dyn CacheStore) {
        join_all(self.keys.iter().map(|key| store.delete(key))).await;
        debug!(keys = ?self.keys, "invalidated dependent caches");
    }
}
