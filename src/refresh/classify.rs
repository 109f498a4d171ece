//! Structural exclusion and kit classification.

use regex::Regex;
use tracing::{debug, info};

use crate::types::{CatalogItem, Classification};
use crate::{Result, StockroomError};

/// Group names of per-unit serialized variants, e.g. `"Merlot — SN-0042"`.
/// Each unit is its own record upstream; the storefront only sells the group.
const SERIALIZED_VARIANT_PATTERN: &str = r"\s—\s[A-Z]+-\d+$";

/// Decides which listed records are worth enriching and which enriched
/// records are kits.
#[derive(Debug, Clone)]
pub struct Classifier {
    serialized_variant: Regex,
    type_label: String,
    kit_categories: Vec<String>,
}

impl Classifier {
    pub fn new(type_label: impl Into<String>, kit_categories: &[String]) -> Result<Self> {
        let serialized_variant = Regex::new(SERIALIZED_VARIANT_PATTERN).map_err(|e| {
            StockroomError::Configuration(format!("invalid serialized variant pattern: {e}"))
        })?;
        Ok(Self {
            serialized_variant,
            type_label: type_label.into(),
            kit_categories: kit_categories.iter().map(|c| c.to_lowercase()).collect(),
        })
    }

    /// Structural pre-filter applied before any detail fetch: services and
    /// serialized variants are never catalog items.
    pub fn is_enrichable(&self, item: &CatalogItem) -> bool {
        !item.is_service() && !self.serialized_variant.is_match(&item.group_name)
    }

    /// Classify an enriched item by its type custom field.
    ///
    /// Every exclusion is logged with the item name for auditability.
    pub fn classify(&self, item: &CatalogItem) -> Classification {
        let Some(kind) = item.custom_fields.get(&self.type_label) else {
            debug!(item = %item.name, item_id = %item.item_id, "excluding item without type field");
            return Classification::Excluded;
        };
        let normalized = kind.to_lowercase();
        if self.kit_categories.iter().any(|c| *c == normalized) {
            Classification::Kit
        } else {
            info!(item = %item.name, item_id = %item.item_id, kind, "excluding non-kit item");
            Classification::Excluded
        }
    }
}
