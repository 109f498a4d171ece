//! Cache key layout.

/// Default namespace shared by every key this crate writes.
pub const DEFAULT_PREFIX: &str = "zoho";

/// Names of every key the catalog pipeline reads or writes.
///
/// All keys share one prefix so the pipeline can live in a Redis database
/// that also holds unrelated cached data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    prefix: String,
}

impl Default for CacheKeys {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl CacheKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Primary catalog item set.
    pub fn catalog(&self) -> String {
        format!("{}:products", self.prefix)
    }

    /// Write timestamp (unix millis) of the catalog item set.
    pub fn freshness(&self) -> String {
        format!("{}:products:ts", self.prefix)
    }

    /// Refresh lock for a named refresh target.
    pub fn lock(&self, target: &str) -> String {
        format!("{}:lock:{target}", self.prefix)
    }

    /// Image fingerprints of the last published catalog.
    pub fn image_fingerprints(&self) -> String {
        format!("{}:product-image-hashes", self.prefix)
    }

    /// Ingredients view (depends on the kit classification).
    pub fn ingredients(&self) -> String {
        format!("{}:ingredients", self.prefix)
    }

    /// Services view.
    pub fn services(&self) -> String {
        format!("{}:services", self.prefix)
    }
}
