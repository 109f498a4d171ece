//! Shared cache store.
//!
//! The orchestrator and read path only ever talk to a [`CacheStore`], a
//! deliberately narrow key/value contract with per-key TTLs and a
//! set-if-absent lock primitive.
//!
//! Two implementations:
//!
//! - [`RedisStore`] (feature `redis`): shared by every replica behind the
//!   load balancer; this is what makes the refresh lock visible across
//!   processes.
//! - [`MemoryStore`]: in-process moka cache for single-replica deployments
//!   and tests.
//!
//! # Degradation contract
//!
//! No method returns an error. An unreachable store behaves as an empty one:
//! `get` misses, `set`/`delete` do nothing, and `acquire_lock` fails *open*
//! (returns `true`) so a refresh can still happen; the orchestrator's
//! in-process guard is then the only exclusion left. Every call is bounded by
//! a short timeout so callers never wait on a dead backend.

mod keys;
mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use keys::{CacheKeys, DEFAULT_PREFIX};
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis::{RedisConfig, RedisStore};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Narrow key/value contract used by the catalog pipeline.
///
/// See the module docs for the degradation rules every implementation must
/// follow.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Backend name for logging/debugging.
    fn name(&self) -> &str;

    /// Fetch a value. `None` on miss, expiry, or an unreachable backend.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store a value with an absolute expiry `ttl` from now.
    async fn set(&self, key: &str, value: String, ttl: Duration);

    /// Remove a key. Missing keys are not an error.
    async fn delete(&self, key: &str);

    /// Atomically create `key` if absent, expiring after `ttl`.
    ///
    /// Returns `true` if this caller now holds the lock, or if the backend is
    /// unreachable (fail open).
    async fn acquire_lock(&self, key: &str, ttl: Duration) -> bool;

    /// Release a lock previously acquired by this store instance.
    async fn release_lock(&self, key: &str);
}

/// Read and decode a JSON value.
///
/// Undecodable payloads are treated as a miss.
pub async fn get_json<T: DeserializeOwned>(store: &dyn CacheStore, key: &str) -> Option<T> {
    let raw = store.get(key).await?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                store = store.name(),
                key,
                error = %e,
                "undecodable cache payload, treating as miss"
            );
            None
        }
    }
}

/// Encode a value as JSON and store it.
///
/// Encoding failures are logged and the write is skipped, matching the
/// store's own no-error contract.
pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Duration,
) {
    match serde_json::to_string(value) {
        Ok(raw) => {
            debug!(store = store.name(), key, bytes = raw.len(), "cache set");
            store.set(key, raw, ttl).await;
        }
        Err(e) => warn!(store = store.name(), key, error = %e, "failed to encode cache payload"),
    }
}

/// Wall-clock milliseconds since the unix epoch, as stored in freshness keys.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
