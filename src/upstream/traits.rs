//! Inventory source trait and its wire types.
//!
//! The catalog pipeline needs exactly two things from the system of record:
//! a paginated listing and a per-record detail fetch that carries the
//! enrichment fields the listing omits. Everything else about the provider
//! (auth, hosts, error mapping) stays behind this trait.
//!
//! # Errors
//!
//! Both calls may return [`StockroomError::RateLimited`](crate::StockroomError::RateLimited)
//! for HTTP 429. Listing pagination is not retried by the pipeline; detail
//! fetches are, via [`RetryingSource`](super::RetryingSource).

use async_trait::async_trait;
use serde::Deserialize;

use crate::Result;
use crate::types::{CatalogItem, Classification, CustomFields, RawCustomField};

/// Listing filter forwarded as query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    /// Provider status filter, e.g. `"active"`.
    pub status: Option<String>,
}

impl ItemFilter {
    /// Only active items.
    pub fn active() -> Self {
        Self {
            status: Some("active".to_string()),
        }
    }
}

/// One page of the item listing.
#[derive(Debug, Clone, Default)]
pub struct ItemPage {
    pub items: Vec<ListedItem>,
    pub has_more: bool,
}

/// An item as returned by the list endpoint (no custom fields, no tax data).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListedItem {
    pub item_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub rate: Option<f64>,
    #[serde(default)]
    pub stock_on_hand: Option<f64>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl From<ListedItem> for CatalogItem {
    fn from(listed: ListedItem) -> Self {
        CatalogItem {
            item_id: listed.item_id,
            name: listed.name,
            sku: listed.sku.unwrap_or_default(),
            rate: listed.rate.unwrap_or(0.0),
            stock_on_hand: listed.stock_on_hand.unwrap_or(0.0),
            product_type: listed.product_type.unwrap_or_default(),
            group_name: listed.group_name.unwrap_or_default(),
            category_name: listed.category_name.unwrap_or_default(),
            status: listed.status.unwrap_or_default(),
            custom_fields: CustomFields::default(),
            brand: String::new(),
            image_name: String::new(),
            tax_id: String::new(),
            tax_name: String::new(),
            tax_percentage: 0.0,
            classification: Classification::Unclassified,
        }
    }
}

/// Enrichment data only the detail endpoint returns.
///
/// Every field may be missing or `null` upstream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemDetail {
    #[serde(default)]
    pub custom_fields: Option<Vec<RawCustomField>>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub tax_name: Option<String>,
    #[serde(default)]
    pub tax_percentage: Option<f64>,
    #[serde(default)]
    pub stock_on_hand: Option<f64>,
}

impl ItemDetail {
    /// Merge detail data into a listed item.
    ///
    /// This is the validation boundary for custom fields: raw provider values
    /// are normalised into [`CustomFields`] here and nowhere else.
    pub fn apply_to(self, item: &mut CatalogItem) {
        item.custom_fields = CustomFields::from_raw(self.custom_fields.unwrap_or_default());
        item.brand = self.brand.unwrap_or_default();
        item.image_name = self.image_name.unwrap_or_default();
        item.tax_id = self.tax_id.unwrap_or_default();
        item.tax_name = self.tax_name.unwrap_or_default();
        item.tax_percentage = self.tax_percentage.unwrap_or(0.0);
        if let Some(stock) = self.stock_on_hand {
            item.stock_on_hand = stock;
        }
    }
}

/// Read access to the inventory system of record.
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Source name for logging/debugging.
    fn name(&self) -> &str;

    /// Fetch one page (1-based) of the item listing.
    async fn list_page(&self, filter: &ItemFilter, page: u32) -> Result<ItemPage>;

    /// Fetch the detail record for one item.
    async fn fetch_detail(&self, item_id: &str) -> Result<ItemDetail>;
}
