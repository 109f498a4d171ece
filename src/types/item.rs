//! Catalog item and its derived classification.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::fields::CustomFields;

/// One immutable generation of catalog items.
///
/// Shared between the cache writer, the snapshot writer and every reader of
/// the generation; never mutated after publication.
pub type ItemSet = Arc<Vec<CatalogItem>>;

/// Derived tag deciding which view(s) an item belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Not yet looked at (fresh from the list endpoint).
    #[default]
    Unclassified,
    /// Sellable kit shown on the products page.
    Kit,
    /// Priced goods that are not kits (ingredients, supplies, equipment).
    Ingredient,
    /// Kept out of every classified view.
    Excluded,
}

/// A product as served to storefront readers.
///
/// Field names follow the inventory provider's wire format so the JSON the
/// storefront receives is unchanged from what the provider returns, plus the
/// derived `classification`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub item_id: String,
    pub name: String,
    #[serde(default)]
    pub sku: String,
    /// Raw selling price as reported upstream.
    #[serde(default)]
    pub rate: f64,
    #[serde(default)]
    pub stock_on_hand: f64,
    /// `"goods"` or `"service"`.
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub category_name: String,
    #[serde(default)]
    pub status: String,

    // Enrichment (detail endpoint only)
    #[serde(default)]
    pub custom_fields: CustomFields,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub image_name: String,
    #[serde(default)]
    pub tax_id: String,
    #[serde(default)]
    pub tax_name: String,
    #[serde(default)]
    pub tax_percentage: f64,

    #[serde(default)]
    pub classification: Classification,
}

impl CatalogItem {
    /// Create a bare item with only identity fields set.
    pub fn new(item_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            name: name.into(),
            sku: String::new(),
            rate: 0.0,
            stock_on_hand: 0.0,
            product_type: "goods".to_string(),
            group_name: String::new(),
            category_name: String::new(),
            status: "active".to_string(),
            custom_fields: CustomFields::default(),
            brand: String::new(),
            image_name: String::new(),
            tax_id: String::new(),
            tax_name: String::new(),
            tax_percentage: 0.0,
            classification: Classification::Unclassified,
        }
    }

    /// Set the SKU.
    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = sku.into();
        self
    }

    /// Set the selling price.
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Set the stock level.
    pub fn with_stock(mut self, stock_on_hand: f64) -> Self {
        self.stock_on_hand = stock_on_hand;
        self
    }

    /// Set the product type (`"goods"` / `"service"`).
    pub fn with_product_type(mut self, product_type: impl Into<String>) -> Self {
        self.product_type = product_type.into();
        self
    }

    /// Set the item group name.
    pub fn with_group_name(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = group_name.into();
        self
    }

    /// Whether the provider models this record as a service rather than goods.
    pub fn is_service(&self) -> bool {
        self.product_type == "service"
    }

    /// Reset every enrichment field to its empty/zero default.
    ///
    /// Used when the detail fetch for this record failed: the record stays in
    /// the catalog with list-view data only.
    pub fn clear_enrichment(&mut self) {
        self.custom_fields = CustomFields::default();
        self.brand.clear();
        self.image_name.clear();
        self.tax_id.clear();
        self.tax_name.clear();
        self.tax_percentage = 0.0;
    }
}
