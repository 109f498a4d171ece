//! Batched, rate-limited detail enrichment.
//!
//! Items are split into fixed-size batches. Batches run one after another;
//! within a batch every detail fetch runs concurrently. A fixed pause between
//! batches keeps the request rate under the provider's per-minute budget.
//! This is a static limiter: the pause does not adapt to 429s, which are
//! handled per record by [`RetryingSource`](crate::upstream::RetryingSource).

use std::collections::HashSet;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::telemetry;
use crate::types::CatalogItem;
use crate::upstream::InventorySource;

/// Batch shape for one enrichment pass.
#[derive(Debug, Clone, Copy)]
pub struct BatchPlan {
    pub batch_size: usize,
    pub pause: Duration,
}

/// Output of [`enrich_items`].
#[derive(Debug, Clone, Default)]
pub struct Enriched {
    /// Every input item, in input order.
    pub items: Vec<CatalogItem>,
    /// Ids whose detail fetch failed; their enrichment fields are defaulted.
    pub degraded: HashSet<String>,
}

impl Enriched {
    pub fn is_degraded(&self, item_id: &str) -> bool {
        self.degraded.contains(item_id)
    }
}

/// Enrich every item with its detail record, preserving input order.
///
/// Never fails: a record whose detail fetch errors (after the source's own
/// retries) is kept with its enrichment fields defaulted and reported in
/// [`Enriched::degraded`].
pub async fn enrich_items(
    source: &dyn InventorySource,
    items: Vec<CatalogItem>,
    plan: BatchPlan,
) -> Enriched {
    let batch_size = plan.batch_size.max(1);
    let batches = items.len().div_ceil(batch_size);
    let mut remaining = items;
    let mut enriched = Enriched {
        items: Vec::with_capacity(remaining.len()),
        degraded: HashSet::new(),
    };

    for idx in 0..batches {
        let take = batch_size.min(remaining.len());
        let batch: Vec<CatalogItem> = remaining.drain(..take).collect();
        debug!(batch = idx + 1, batches, size = batch.len(), "enriching batch");

        let results = join_all(batch.into_iter().map(|item| enrich_one(source, item))).await;
        for (item, ok) in results {
            if !ok {
                enriched.degraded.insert(item.item_id.clone());
            }
            enriched.items.push(item);
        }

        if idx + 1 < batches && !plan.pause.is_zero() {
            tokio::time::sleep(plan.pause).await;
        }
    }

    enriched
}

async fn enrich_one(source: &dyn InventorySource, mut item: CatalogItem) -> (CatalogItem, bool) {
    match source.fetch_detail(&item.item_id).await {
        Ok(detail) => {
            detail.apply_to(&mut item);
            (item, true)
        }
        Err(e) => {
            warn!(
                item = %item.name,
                item_id = %item.item_id,
                error = %e,
                "detail fetch failed, keeping item without enrichment"
            );
            metrics::counter!(telemetry::ENRICHMENT_DEGRADED_TOTAL).increment(1);
            item.clear_enrichment();
            (item, false)
        }
    }
}
