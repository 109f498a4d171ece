//! In-process cache store.
//!
//! Backed by moka's async cache with a per-entry expiry policy, so every key
//! carries its own TTL exactly like the shared store. Locks are ordinary
//! entries created through moka's atomic insert-if-absent entry API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;

use super::CacheStore;

/// Default maximum number of keys held.
const DEFAULT_MAX_ENTRIES: u64 = 10_000;

#[derive(Clone)]
struct StoredValue {
    value: String,
    ttl: Duration,
}

/// Expire each entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Single-process [`CacheStore`].
///
/// Locks taken here only exclude callers sharing this instance; use the
/// Redis store when several replicas refresh the same catalog.
pub struct MemoryStore {
    entries: Cache<String, StoredValue>,
}

impl MemoryStore {
    /// Create an empty store with the default capacity (10,000 keys).
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    /// Create a store with a custom capacity.
    pub fn with_max_entries(max: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }

    /// Whether `key` is currently present (and unexpired).
    pub async fn contains(&self, key: &str) -> bool {
        self.entries.get(key).await.is_some()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).await.map(|stored| stored.value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        self.entries
            .insert(key.to_string(), StoredValue { value, ttl })
            .await;
    }

    async fn delete(&self, key: &str) {
        self.entries.invalidate(key).await;
    }

    async fn acquire_lock(&self, key: &str, ttl: Duration) -> bool {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(async move {
                StoredValue {
                    value: "1".to_string(),
                    ttl,
                }
            })
            .await;
        entry.is_fresh()
    }

    async fn release_lock(&self, key: &str) {
        self.entries.invalidate(key).await;
    }
}
