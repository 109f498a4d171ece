//! Stockroom - stale-while-revalidate product catalog cache
//!
//! This crate sits between a storefront and a rate-limited inventory API.
//! It keeps a classified, enriched product catalog in a shared cache store,
//! serves readers from the cache (or an on-disk snapshot) without waiting on
//! upstream, and guarantees that at most one refresh runs at a time across
//! every replica.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stockroom::{RefreshTokenAuth, OAuthCredentials, Stockroom, ZohoInventoryClient};
//! use stockroom::upstream::zoho::accounts_host;
//!
//! #[tokio::main]
//! async fn main() -> stockroom::Result<()> {
//!     let tokens = RefreshTokenAuth::new(
//!         accounts_host(".com"),
//!         OAuthCredentials {
//!             client_id: "client-id".into(),
//!             client_secret: "client-secret".into(),
//!             refresh_token: "refresh-token".into(),
//!         },
//!     )?;
//!     let client = ZohoInventoryClient::new(".com", "123456789", Arc::new(tokens))?;
//!
//!     let catalog = Stockroom::builder()
//!         .source(Arc::new(client))
//!         .snapshot("/var/cache/stockroom/products-cache.json")
//!         .build()?;
//!
//!     let read = catalog.get_catalog().await?;
//!     println!("{} kits from {}", read.len(), read.source);
//!     Ok(())
//! }
//! ```
//!
//! # Shared store (requires `redis` feature)
//!
//! ```rust,ignore
//! use stockroom::{RedisConfig, RedisStore};
//!
//! let store = RedisStore::new(RedisConfig::new("redis://cache:6379"))?;
//! let catalog = Stockroom::builder()
//!     .source(source)
//!     .store(Arc::new(store))
//!     .build()?;
//! ```

pub mod catalog;
pub mod error;
pub mod refresh;
#[cfg(feature = "server")]
pub mod server;
pub mod snapshot;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod upstream;
pub mod version;

// Re-export main types at crate root
pub use catalog::{Catalog, Stockroom, StockroomBuilder, ViewConfig};
pub use error::{Result, StockroomError};
pub use refresh::{
    FreshnessPolicy, RefreshConfig, RefreshOrchestrator, RefreshOutcome, SkipReason,
};
pub use snapshot::Snapshot;
pub use store::{CacheKeys, CacheStore, MemoryStore};
#[cfg(feature = "redis")]
pub use store::{RedisConfig, RedisStore};
pub use upstream::{
    InventorySource, OAuthCredentials, RefreshTokenAuth, RetryConfig, RetryingSource, StaticToken,
    TokenSource, ZohoInventoryClient,
};

// Re-export all types
pub use types::{
    CatalogItem, CatalogRead, CatalogSource, Classification, CustomFields, ImageFingerprintMap,
    ItemSet,
};
