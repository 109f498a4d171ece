//! Read results handed back to storefront callers.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::item::ItemSet;

/// Which tier served a read.
///
/// Diagnostic only; serialized with the names the storefront already logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogSource {
    /// Shared cache store hit.
    #[serde(rename = "cache")]
    Hot,
    /// On-disk snapshot, hot cache was empty.
    #[serde(rename = "file-cache")]
    Snapshot,
    /// Fetched from the inventory provider during this request.
    #[serde(rename = "zoho")]
    Live,
}

impl CatalogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogSource::Hot => "cache",
            CatalogSource::Snapshot => "file-cache",
            CatalogSource::Live => "zoho",
        }
    }
}

impl fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response envelope: `{ "source": ..., "items": [...] }`.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogRead {
    pub source: CatalogSource,
    pub items: ItemSet,
}

impl CatalogRead {
    pub fn new(source: CatalogSource, items: ItemSet) -> Self {
        Self { source, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
