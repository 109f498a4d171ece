//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use stockroom::types::RawCustomField;
use stockroom::upstream::{InventorySource, ItemDetail, ItemFilter, ItemPage, ListedItem};
use stockroom::{Result, StockroomError};

/// In-memory inventory with scriptable failures.
pub struct MockInventory {
    listing: Mutex<Vec<ListedItem>>,
    details: Mutex<HashMap<String, ItemDetail>>,
    failing: Mutex<HashSet<String>>,
    rate_limited: Mutex<HashMap<String, u32>>,
    page_size: usize,
    list_delay: Option<Duration>,
    listing_fails: AtomicBool,
    list_calls: AtomicU32,
    detail_calls: AtomicU32,
}

impl MockInventory {
    pub fn new() -> Self {
        Self {
            listing: Mutex::new(Vec::new()),
            details: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            rate_limited: Mutex::new(HashMap::new()),
            page_size: 200,
            list_delay: None,
            listing_fails: AtomicBool::new(false),
            list_calls: AtomicU32::new(0),
            detail_calls: AtomicU32::new(0),
        }
    }

    pub fn with_item(self, item: (ListedItem, ItemDetail)) -> Self {
        self.add_item(item);
        self
    }

    pub fn with_items(self, items: impl IntoIterator<Item = (ListedItem, ItemDetail)>) -> Self {
        for item in items {
            self.add_item(item);
        }
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Delay every listing page, keeping a refresh in flight.
    pub fn list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    /// Every detail fetch for `item_id` fails with a non-retryable error.
    pub fn failing_detail(self, item_id: &str) -> Self {
        self.failing.lock().unwrap().insert(item_id.to_string());
        self
    }

    /// The first `times` detail fetches for `item_id` are rate limited.
    pub fn rate_limited(self, item_id: &str, times: u32) -> Self {
        self.rate_limited
            .lock()
            .unwrap()
            .insert(item_id.to_string(), times);
        self
    }

    pub fn add_item(&self, (listed, detail): (ListedItem, ItemDetail)) {
        self.details
            .lock()
            .unwrap()
            .insert(listed.item_id.clone(), detail);
        self.listing.lock().unwrap().push(listed);
    }

    /// Replace the detail record of an existing item.
    pub fn set_detail(&self, item_id: &str, detail: ItemDetail) {
        self.details
            .lock()
            .unwrap()
            .insert(item_id.to_string(), detail);
    }

    pub fn set_listing_fails(&self, fails: bool) {
        self.listing_fails.store(fails, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> u32 {
        self.detail_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InventorySource for MockInventory {
    fn name(&self) -> &str {
        "mock-inventory"
    }

    async fn list_page(&self, _filter: &ItemFilter, page: u32) -> Result<ItemPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        if self.listing_fails.load(Ordering::SeqCst) {
            return Err(StockroomError::Http("connection reset".into()));
        }

        let listing = self.listing.lock().unwrap();
        let start = (page as usize - 1) * self.page_size;
        let items: Vec<ListedItem> = listing
            .iter()
            .skip(start)
            .take(self.page_size)
            .cloned()
            .collect();
        Ok(ItemPage {
            has_more: start + items.len() < listing.len(),
            items,
        })
    }

    async fn fetch_detail(&self, item_id: &str) -> Result<ItemDetail> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(item_id) {
            return Err(StockroomError::Api {
                status: 500,
                message: "internal error".into(),
            });
        }
        {
            let mut limited = self.rate_limited.lock().unwrap();
            if let Some(remaining) = limited.get_mut(item_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(StockroomError::RateLimited { retry_after: None });
                }
            }
        }
        self.details
            .lock()
            .unwrap()
            .get(item_id)
            .cloned()
            .ok_or_else(|| StockroomError::ItemNotFound(item_id.to_string()))
    }
}

pub fn listed(id: &str, name: &str) -> ListedItem {
    ListedItem {
        item_id: id.to_string(),
        name: name.to_string(),
        sku: Some(format!("SKU-{id}")),
        rate: Some(0.0),
        stock_on_hand: Some(10.0),
        product_type: Some("goods".to_string()),
        group_name: None,
        category_name: None,
        status: Some("active".to_string()),
    }
}

pub fn typed_detail(kind: &str) -> ItemDetail {
    ItemDetail {
        custom_fields: Some(vec![RawCustomField {
            label: "Type".to_string(),
            value: serde_json::Value::String(kind.to_string()),
        }]),
        brand: Some("Vintner's Best".to_string()),
        image_name: Some(format!("{}.jpg", kind.to_lowercase())),
        tax_id: Some("tax-1".to_string()),
        tax_name: Some("GST".to_string()),
        tax_percentage: Some(5.0),
        stock_on_hand: None,
    }
}

/// A kit whose detail record carries `Type = kind`.
pub fn kit(id: &str, name: &str, kind: &str) -> (ListedItem, ItemDetail) {
    let mut item = listed(id, name);
    item.rate = Some(129.99);
    (item, typed_detail(kind))
}

/// A priced good without a kit type.
pub fn ingredient(id: &str, name: &str, rate: f64) -> (ListedItem, ItemDetail) {
    let mut item = listed(id, name);
    item.rate = Some(rate);
    (item, typed_detail("Ingredient"))
}

pub fn service(id: &str, name: &str) -> (ListedItem, ItemDetail) {
    let mut item = listed(id, name);
    item.product_type = Some("service".to_string());
    item.rate = Some(25.0);
    (item, ItemDetail::default())
}
