//! Secondary read-through views derived from the inventory listing.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::{Catalog, served};
use crate::Result;
use crate::refresh::{BatchPlan, enrich_items};
use crate::store::{get_json, set_json};
use crate::types::{CatalogItem, CatalogRead, CatalogSource, Classification};
use crate::upstream::{ItemFilter, fetch_all_items};

/// Settings for the ingredients and services views.
#[derive(Debug, Clone)]
pub struct ViewConfig {
    /// Cache lifetime of each view. Default: 300s.
    pub ttl: Duration,
    /// Pause between enrichment batches when rebuilding the ingredients
    /// view. Default: 2s.
    pub ingredient_batch_pause: Duration,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            ingredient_batch_pause: Duration::from_secs(2),
        }
    }
}

impl Catalog {
    /// Priced goods that are neither services nor kits.
    ///
    /// Kits are recognised through the classification of the last refresh,
    /// which is why every refresh drops this view.
    pub async fn ingredients(&self) -> Result<CatalogRead> {
        let store = self.orchestrator.store();
        let key = self.orchestrator.keys().ingredients();

        if let Some(items) = get_json::<Vec<CatalogItem>>(store, &key).await {
            debug!(items = items.len(), "ingredients cache hit");
            return Ok(served("ingredients", CatalogSource::Hot, Arc::new(items)));
        }

        let marker = self.publish_marker().await;
        let source = self.orchestrator.source();
        let listed = fetch_all_items(source, &ItemFilter::active()).await?;
        let kit_ids = self.orchestrator.kit_ids().await;
        let candidates: Vec<CatalogItem> = listed
            .into_iter()
            .filter(|item| {
                !item.is_service() && item.rate > 0.0 && !kit_ids.contains(&item.item_id)
            })
            .collect();
        info!(
            candidates = candidates.len(),
            "ingredients cache miss, enriching priced items"
        );

        let plan = BatchPlan {
            batch_size: self.orchestrator.config().batch_size,
            pause: self.views.ingredient_batch_pause,
        };
        let mut items = enrich_items(source, candidates, plan).await.items;
        for item in &mut items {
            item.classification = Classification::Ingredient;
        }

        // A refresh that published meanwhile invalidated this view and may
        // have reclassified items; the next reader rebuilds against it.
        if self.publish_marker().await == marker {
            set_json(store, &key, &items, self.views.ttl).await;
            if self.publish_marker().await != marker {
                store.delete(&key).await;
            }
        } else {
            debug!("catalog refreshed during ingredients rebuild, not caching");
        }
        Ok(served("ingredients", CatalogSource::Live, Arc::new(items)))
    }

    /// Changes whenever a catalog generation is published: by this process
    /// (generation counter) or by any replica (freshness stamp).
    async fn publish_marker(&self) -> (u64, Option<String>) {
        let generation = self.orchestrator.generation();
        let stamp = self
            .orchestrator
            .store()
            .get(&self.orchestrator.keys().freshness())
            .await;
        (generation, stamp)
    }

    /// Active service records (bottling, equipment rental and the like).
    pub async fn services(&self) -> Result<CatalogRead> {
        let store = self.orchestrator.store();
        let key = self.orchestrator.keys().services();

        if let Some(items) = get_json::<Vec<CatalogItem>>(store, &key).await {
            debug!(items = items.len(), "services cache hit");
            return Ok(served("services", CatalogSource::Hot, Arc::new(items)));
        }

        let listed = fetch_all_items(self.orchestrator.source(), &ItemFilter::active()).await?;
        let items: Vec<CatalogItem> = listed
            .into_iter()
            .filter(CatalogItem::is_service)
            .collect();
        info!(items = items.len(), "services cache miss, listed from inventory");

        set_json(store, &key, &items, self.views.ttl).await;
        Ok(served("services", CatalogSource::Live, Arc::new(items)))
    }
}
