//! Stockroom error types

use std::time::Duration;

/// Stockroom error types
#[derive(Debug, thiserror::Error)]
pub enum StockroomError {
    // Upstream/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("item not found: {0}")]
    ItemNotFound(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Hot cache and snapshot were both empty and no live refresh produced
    /// a catalog in time.
    #[error("catalog temporarily unavailable")]
    CatalogUnavailable,
}

impl StockroomError {
    /// Whether the upstream asked us to slow down (HTTP 429).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, StockroomError::RateLimited { .. })
    }

    /// Provider-supplied `retry-after` hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            StockroomError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for Stockroom operations
pub type Result<T> = std::result::Result<T, StockroomError>;
