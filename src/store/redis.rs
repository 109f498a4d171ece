//! Redis-backed cache store shared across replicas.
//!
//! Connects lazily on first use and never surfaces a backend error: every
//! failure is logged, counted under
//! [`STORE_DEGRADED_TOTAL`](crate::telemetry::STORE_DEGRADED_TOTAL), and
//! answered with the safe default from the [`CacheStore`] contract.
//!
//! # Locks
//!
//! `acquire_lock` is `SET key <token> NX PX <ttl>` with a token unique to this
//! store instance. `release_lock` deletes the key only while it still holds
//! that token (compare-and-delete script), so a holder whose lock already
//! expired and was taken by another replica cannot release the newcomer's
//! lock.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{CacheStore, now_millis};
use crate::telemetry;
use crate::{Result, StockroomError};

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Connection and timeout settings for [`RedisStore`].
///
/// ```rust
/// # use stockroom::store::RedisConfig;
/// # use std::time::Duration;
/// let config = RedisConfig::new("redis://cache.internal:6379")
///     .timeout(Duration::from_millis(250));
/// assert_eq!(config.url, "redis://cache.internal:6379");
/// ```
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL. Default: `redis://localhost:6379`.
    pub url: String,
    /// Upper bound for any single operation, connecting included. Default: 500ms.
    pub timeout: Duration,
    /// Minimum wait before retrying a failed connect. Default: 5s.
    pub reconnect_backoff: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            timeout: Duration::from_millis(500),
            reconnect_backoff: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Config for a URL with default timeouts.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the per-operation timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the minimum wait between connect attempts.
    pub fn reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }
}

#[derive(Default)]
struct ConnState {
    manager: Option<ConnectionManager>,
    retry_at: Option<Instant>,
}

/// Shared [`CacheStore`] on Redis.
pub struct RedisStore {
    client: redis::Client,
    config: RedisConfig,
    conn: Mutex<ConnState>,
    lock_token: String,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("config", &self.config)
            .field("lock_token", &self.lock_token)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Create a store. Only the URL is validated here; the connection is
    /// opened on first use (or by [`connect`](Self::connect)).
    pub fn new(config: RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            StockroomError::Configuration(format!("invalid redis url {}: {e}", config.url))
        })?;
        Ok(Self {
            client,
            config,
            conn: Mutex::new(ConnState::default()),
            lock_token: format!("{}:{}", std::process::id(), now_millis()),
        })
    }

    /// Eagerly open the connection. Returns whether the store is reachable;
    /// an unreachable store is still usable (it degrades).
    pub async fn connect(&self) -> bool {
        let connected = self.connection().await.is_some();
        if connected {
            info!(url = %self.config.url, "redis connected");
        } else {
            warn!(
                url = %self.config.url,
                "redis unavailable, caching disabled until it comes back"
            );
        }
        connected
    }

    async fn connection(&self) -> Option<ConnectionManager> {
        let mut state = self.conn.lock().await;
        if let Some(manager) = &state.manager {
            return Some(manager.clone());
        }
        if state.retry_at.is_some_and(|at| Instant::now() < at) {
            return None;
        }

        let attempt = timeout(
            self.config.timeout,
            ConnectionManager::new(self.client.clone()),
        )
        .await;
        match attempt {
            Ok(Ok(manager)) => {
                state.manager = Some(manager.clone());
                state.retry_at = None;
                Some(manager)
            }
            Ok(Err(e)) => {
                warn!(url = %self.config.url, error = %e, "redis connect failed");
                state.retry_at = Some(Instant::now() + self.config.reconnect_backoff);
                None
            }
            Err(_) => {
                warn!(url = %self.config.url, "redis connect timed out");
                state.retry_at = Some(Instant::now() + self.config.reconnect_backoff);
                None
            }
        }
    }

    /// Run one command against the connection, bounded by the timeout.
    ///
    /// `None` means the store is unreachable or the command failed; the
    /// caller substitutes its safe default.
    async fn run<T, F, Fut>(&self, operation: &'static str, key: &str, f: F) -> Option<T>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: std::future::Future<Output = redis::RedisResult<T>>,
    {
        let Some(conn) = self.connection().await else {
            metrics::counter!(telemetry::STORE_DEGRADED_TOTAL, "operation" => operation)
                .increment(1);
            return None;
        };
        match timeout(self.config.timeout, f(conn)).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(operation, key, error = %e, "redis command failed");
                metrics::counter!(telemetry::STORE_DEGRADED_TOTAL, "operation" => operation)
                    .increment(1);
                None
            }
            Err(_) => {
                warn!(
                    operation,
                    key,
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "redis command timed out"
                );
                metrics::counter!(telemetry::STORE_DEGRADED_TOTAL, "operation" => operation)
                    .increment(1);
                None
            }
        }
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.run("get", key, |mut conn| async move {
            conn.get::<_, Option<String>>(key).await
        })
        .await
        .flatten()
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let millis = ttl.as_millis().max(1) as u64;
        self.run("set", key, |mut conn| async move {
            conn.pset_ex::<_, _, ()>(key, value, millis).await
        })
        .await;
    }

    async fn delete(&self, key: &str) {
        self.run("delete", key, |mut conn| async move {
            conn.del::<_, ()>(key).await
        })
        .await;
    }

    async fn acquire_lock(&self, key: &str, ttl: Duration) -> bool {
        let token = self.lock_token.clone();
        let millis = ttl.as_millis().max(1) as u64;
        let reply = self
            .run("acquire_lock", key, |mut conn| async move {
                let reply: Option<String> = redis::cmd("SET")
                    .arg(key)
                    .arg(token)
                    .arg("NX")
                    .arg("PX")
                    .arg(millis)
                    .query_async(&mut conn)
                    .await?;
                Ok(reply)
            })
            .await;
        match reply {
            Some(acquired) => {
                debug!(key, acquired = acquired.is_some(), "redis lock attempt");
                acquired.is_some()
            }
            None => {
                warn!(key, "redis unavailable, lock fails open");
                true
            }
        }
    }

    async fn release_lock(&self, key: &str) {
        let token = self.lock_token.clone();
        self.run("release_lock", key, |mut conn| async move {
            let released: i64 = redis::Script::new(RELEASE_SCRIPT)
                .key(key)
                .arg(token)
                .invoke_async(&mut conn)
                .await?;
            Ok(released)
        })
        .await;
    }
}
