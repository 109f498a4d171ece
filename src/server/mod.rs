//! HTTP surface for the storefront.
//!
//! This module provides:
//! - The axum router over a [`Catalog`] (`router`)
//! - Request handlers (`routes`)
//! - Configuration types for the daemon (`config`)
//!
//! Refresh is never exposed over HTTP; it only runs on a cache miss, on
//! staleness, and at startup.

pub mod config;
pub mod routes;

use axum::Router;
use axum::routing::get;

use crate::Catalog;

/// Build the storefront router.
pub fn router(catalog: Catalog) -> Router {
    Router::new()
        .route("/api/products", get(routes::products))
        .route("/api/ingredients", get(routes::ingredients))
        .route("/api/services", get(routes::services))
        .route("/healthz", get(routes::health))
        .with_state(catalog)
}
