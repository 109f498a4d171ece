//! Upstream inventory access.
//!
//! - [`InventorySource`]: the two-call contract the pipeline depends on.
//! - [`ZohoInventoryClient`]: reqwest implementation against Zoho Inventory.
//! - [`RetryingSource`]: decorator adding rate-limit backoff to detail fetches.
//! - [`TokenSource`]: OAuth access tokens for the client.

pub mod auth;
pub mod retry;
pub mod traits;
pub mod zoho;

pub use auth::{OAuthCredentials, RefreshTokenAuth, StaticToken, TokenSource};
pub use retry::{RetryConfig, RetryingSource};
pub use traits::{InventorySource, ItemDetail, ItemFilter, ItemPage, ListedItem};
pub use zoho::ZohoInventoryClient;

use tracing::debug;

use crate::types::CatalogItem;
use crate::{Result, StockroomError};

/// Hard stop for runaway pagination (100,000 items at 200 per page).
const MAX_PAGES: u32 = 500;

/// Fetch every item matching `filter`, following pages until the source
/// reports no more.
///
/// Any page error aborts the walk; a partial listing is never returned.
pub async fn fetch_all_items(
    source: &dyn InventorySource,
    filter: &ItemFilter,
) -> Result<Vec<CatalogItem>> {
    let mut items = Vec::new();
    for page in 1..=MAX_PAGES {
        let ItemPage {
            items: listed,
            has_more,
        } = source.list_page(filter, page).await?;
        debug!(source = source.name(), page, count = listed.len(), has_more, "listed page");
        items.extend(listed.into_iter().map(CatalogItem::from));
        if !has_more {
            return Ok(items);
        }
    }
    Err(StockroomError::Api {
        status: 0,
        message: format!("listing exceeded {MAX_PAGES} pages"),
    })
}
