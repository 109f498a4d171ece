//! Layered catalog read path.
//!
//! Readers never wait on the inventory provider when any cached generation
//! exists. A read walks three layers:
//!
//! 1. the hot cache in the shared store (served immediately, refreshed in the
//!    background once older than the soft TTL);
//! 2. the on-disk snapshot (served, copied back into the store, refreshed in
//!    the background);
//! 3. a live refresh, awaited by the caller.

mod builder;
mod views;

pub use builder::{Stockroom, StockroomBuilder};
pub use views::ViewConfig;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::refresh::{RefreshOrchestrator, RefreshOutcome, SkipReason};
use crate::store::{get_json, now_millis, set_json};
use crate::telemetry;
use crate::types::{CatalogItem, CatalogRead, CatalogSource, ItemSet};
use crate::{Result, StockroomError};

const PRODUCTS_VIEW: &str = "products";

/// Storefront-facing catalog handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Catalog {
    orchestrator: Arc<RefreshOrchestrator>,
    views: ViewConfig,
    cold_poll_interval: Duration,
}

impl Catalog {
    pub(crate) fn new(
        orchestrator: Arc<RefreshOrchestrator>,
        views: ViewConfig,
        cold_poll_interval: Duration,
    ) -> Self {
        Self {
            orchestrator,
            views,
            cold_poll_interval,
        }
    }

    pub fn orchestrator(&self) -> &Arc<RefreshOrchestrator> {
        &self.orchestrator
    }

    /// Return the current kit catalog and where it was served from.
    ///
    /// Only fails when no generation exists anywhere and a live refresh
    /// could not produce one.
    pub async fn get_catalog(&self) -> Result<CatalogRead> {
        let store = self.orchestrator.store();
        let keys = self.orchestrator.keys();
        let catalog_key = keys.catalog();
        let freshness_key = keys.freshness();

        let (cached, stamp) = tokio::join!(
            get_json::<Vec<CatalogItem>>(store, &catalog_key),
            store.get(&freshness_key)
        );

        if let Some(items) = cached {
            let items: ItemSet = Arc::new(items);
            self.orchestrator.seed_classification(&items).await;

            let age = stamp
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .map(|written| Duration::from_millis(now_millis().saturating_sub(written)));
            match age {
                Some(age) if !self.orchestrator.policy().is_stale(age) => {
                    debug!(items = items.len(), age_secs = age.as_secs(), "catalog cache hit");
                }
                _ => {
                    info!(
                        items = items.len(),
                        age_secs = age.map(|a| a.as_secs()),
                        "catalog cache stale, refreshing in background"
                    );
                    self.spawn_refresh();
                }
            }
            return Ok(served(PRODUCTS_VIEW, CatalogSource::Hot, items));
        }

        if let Some(items) = self.load_snapshot().await {
            info!(items = items.len(), "serving catalog from snapshot");
            let ttl = self.orchestrator.policy().hard_ttl();
            set_json(store, &catalog_key, items.as_slice(), ttl).await;
            store
                .set(&freshness_key, now_millis().to_string(), ttl)
                .await;
            self.orchestrator.seed_classification(&items).await;
            self.spawn_refresh();
            return Ok(served(PRODUCTS_VIEW, CatalogSource::Snapshot, items));
        }

        info!("catalog cache miss, fetching from inventory");
        self.refresh_live().await
    }

    /// Drop the published catalog so the next read rebuilds it.
    ///
    /// Called after a sale changes stock levels.
    pub async fn invalidate(&self) {
        let store = self.orchestrator.store();
        let keys = self.orchestrator.keys();
        let catalog_key = keys.catalog();
        let freshness_key = keys.freshness();
        tokio::join!(store.delete(&catalog_key), store.delete(&freshness_key));
        info!("catalog invalidated");
    }

    async fn load_snapshot(&self) -> Option<ItemSet> {
        let snapshot = self.orchestrator.snapshot()?.clone();
        let items = tokio::task::spawn_blocking(move || snapshot.load())
            .await
            .ok()
            .flatten()?;
        (!items.is_empty()).then(|| Arc::new(items))
    }

    fn spawn_refresh(&self) {
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            if let Err(e) = orchestrator.refresh().await {
                error!(error = %e, "background refresh failed");
            }
        });
    }

    async fn refresh_live(&self) -> Result<CatalogRead> {
        let completed = self.orchestrator.subscribe();
        match self.orchestrator.refresh().await? {
            RefreshOutcome::Refreshed(items) => {
                Ok(served(PRODUCTS_VIEW, CatalogSource::Live, items))
            }
            RefreshOutcome::Skipped(reason) => {
                info!(?reason, "refresh already running, waiting for it");
                self.await_refresh(completed, reason).await
            }
        }
    }

    /// Wait for somebody else's refresh: either this process's own refresh
    /// finishing, or the catalog key appearing in the shared store. Bounded
    /// by the lock TTL, after which the other refresher is presumed dead.
    ///
    /// An in-process refresh can publish its result between our subscribe
    /// and its guard being cleared, so the notification is never seen as a
    /// change. The poll picks that result up once the guard is clear.
    async fn await_refresh(
        &self,
        mut completed: watch::Receiver<Option<ItemSet>>,
        reason: SkipReason,
    ) -> Result<CatalogRead> {
        let store = self.orchestrator.store();
        let catalog_key = self.orchestrator.keys().catalog();
        let deadline = Instant::now() + self.orchestrator.config().lock_ttl;

        let mut poll = tokio::time::interval(self.cold_poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = completed.changed() => {
                    if changed.is_err() {
                        return Err(StockroomError::CatalogUnavailable);
                    }
                    let generation = completed.borrow_and_update().clone();
                    return match generation {
                        Some(items) => Ok(served(PRODUCTS_VIEW, CatalogSource::Live, items)),
                        None => Err(StockroomError::CatalogUnavailable),
                    };
                }
                _ = poll.tick() => {
                    if let Some(items) = get_json::<Vec<CatalogItem>>(store, &catalog_key).await {
                        return Ok(served(PRODUCTS_VIEW, CatalogSource::Hot, Arc::new(items)));
                    }
                    if reason == SkipReason::InProgress && !self.orchestrator.is_refreshing() {
                        let generation = completed.borrow_and_update().clone();
                        return match generation {
                            Some(items) => Ok(served(PRODUCTS_VIEW, CatalogSource::Live, items)),
                            None => Err(StockroomError::CatalogUnavailable),
                        };
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    info!("gave up waiting for another refresh");
                    return Err(StockroomError::CatalogUnavailable);
                }
            }
        }
    }
}

fn served(view: &'static str, source: CatalogSource, items: ItemSet) -> CatalogRead {
    metrics::counter!(telemetry::READS_TOTAL, "view" => view, "source" => source.as_str())
        .increment(1);
    CatalogRead::new(source, items)
}
