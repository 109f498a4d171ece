//! Catalog refresh orchestration.
//!
//! [`RefreshOrchestrator`] rebuilds the catalog from the inventory source and
//! publishes it to the shared store. At most one refresh runs at a time:
//!
//! - across tasks in this process, via an in-process guard (no store round
//!   trip for the losers);
//! - across replicas, via a lock key in the shared store.
//!
//! A refresh either publishes a complete item set or leaves the previous
//! generation untouched. A record whose detail fetch failed is still
//! published, with defaulted enrichment and the kit status it had in the
//! previous generation.

mod classify;
mod config;
mod enrich;
mod invalidate;

pub use classify::Classifier;
pub use config::{FreshnessPolicy, RefreshConfig};
pub use enrich::{BatchPlan, Enriched, enrich_items};
pub use invalidate::DependentKeys;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::{RwLock, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::Result;
use crate::snapshot::Snapshot;
use crate::store::{CacheKeys, CacheStore, get_json, now_millis, set_json};
use crate::telemetry;
use crate::types::{CatalogItem, Classification, ImageFingerprintMap, ItemSet};
use crate::upstream::{InventorySource, ItemFilter, RetryingSource, fetch_all_items};

/// Why a refresh call returned without fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another task in this process is already refreshing.
    InProgress,
    /// Another replica holds the refresh lock.
    LockHeld,
}

impl SkipReason {
    fn as_str(&self) -> &'static str {
        match self {
            SkipReason::InProgress => "in_progress",
            SkipReason::LockHeld => "lock_held",
        }
    }
}

/// Result of a refresh call that did not fail.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// This call fetched and published a new generation.
    Refreshed(ItemSet),
    /// Someone else is refreshing; nothing was fetched.
    Skipped(SkipReason),
}

/// Clears the in-process guard on every exit path, including unwinding.
struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the refresh protocol and the state derived from the last refresh.
///
/// Constructed once per process by [`Stockroom::builder`](crate::Stockroom::builder)
/// and shared behind an `Arc`.
pub struct RefreshOrchestrator {
    store: Arc<dyn CacheStore>,
    source: Arc<dyn InventorySource>,
    snapshot: Option<Snapshot>,
    keys: CacheKeys,
    policy: FreshnessPolicy,
    config: RefreshConfig,
    classifier: Classifier,
    dependents: DependentKeys,
    refreshing: AtomicBool,
    kit_ids: RwLock<HashSet<String>>,
    generation: AtomicU64,
    completed: watch::Sender<Option<ItemSet>>,
}

impl std::fmt::Debug for RefreshOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshOrchestrator")
            .field("store", &self.store.name())
            .field("source", &self.source.name())
            .field("snapshot", &self.snapshot.as_ref().map(Snapshot::path))
            .field("keys", &self.keys)
            .field("policy", &self.policy)
            .field("config", &self.config)
            .field("refreshing", &self.refreshing.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl RefreshOrchestrator {
    /// `source` is wrapped in a [`RetryingSource`] using `config.retry`.
    pub(crate) fn new(
        store: Arc<dyn CacheStore>,
        source: Arc<dyn InventorySource>,
        snapshot: Option<Snapshot>,
        keys: CacheKeys,
        policy: FreshnessPolicy,
        config: RefreshConfig,
        dependents: DependentKeys,
    ) -> Result<Self> {
        config.validate()?;
        let classifier = Classifier::new(config.type_label.clone(), &config.kit_categories)?;
        let source: Arc<dyn InventorySource> =
            Arc::new(RetryingSource::new(source, config.retry.clone()));
        let (completed, _) = watch::channel(None);
        Ok(Self {
            store,
            source,
            snapshot,
            keys,
            policy,
            config,
            classifier,
            dependents,
            refreshing: AtomicBool::new(false),
            kit_ids: RwLock::new(HashSet::new()),
            generation: AtomicU64::new(0),
            completed,
        })
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    pub fn policy(&self) -> FreshnessPolicy {
        self.policy
    }

    /// Whether a refresh is running in this process right now.
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// Receive a notification at the end of every refresh attempt run by this
    /// process: `Some(items)` after a publish, `None` after a failure.
    pub fn subscribe(&self) -> watch::Receiver<Option<ItemSet>> {
        self.completed.subscribe()
    }

    /// Snapshot of the ids classified as kits by the last refresh (or seeded
    /// from a cached generation).
    pub async fn kit_ids(&self) -> HashSet<String> {
        self.kit_ids.read().await.clone()
    }

    /// Number of generations this process has published. Derived views
    /// compare it before and after a rebuild to detect a refresh in between.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub async fn is_kit(&self, item_id: &str) -> bool {
        self.kit_ids.read().await.contains(item_id)
    }

    /// Populate the kit-id set from a cached generation, unless a refresh in
    /// this process already set it.
    pub async fn seed_classification(&self, items: &[CatalogItem]) {
        let mut ids = self.kit_ids.write().await;
        if !ids.is_empty() {
            return;
        }
        ids.extend(items.iter().map(|item| item.item_id.clone()));
        debug!(count = ids.len(), "seeded kit ids from cached catalog");
    }

    /// The retrying source used for every upstream call.
    pub(crate) fn source(&self) -> &dyn InventorySource {
        self.source.as_ref()
    }

    pub(crate) fn store(&self) -> &dyn CacheStore {
        self.store.as_ref()
    }

    pub(crate) fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    pub(crate) fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Rebuild and publish the catalog, unless someone else already is.
    ///
    /// Errors only when the listing fails; the previously published
    /// generation then stays in place.
    #[instrument(skip(self), fields(target = %self.config.target))]
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let Some(_guard) = RefreshGuard::try_acquire(&self.refreshing) else {
            debug!("refresh already running in this process");
            return Ok(self.skipped(SkipReason::InProgress));
        };

        let lock_key = self.keys.lock(&self.config.target);
        if !self.store.acquire_lock(&lock_key, self.config.lock_ttl).await {
            debug!(lock = %lock_key, "refresh lock held elsewhere");
            return Ok(self.skipped(SkipReason::LockHeld));
        }

        let start = Instant::now();
        let result = self.rebuild().await;
        self.store.release_lock(&lock_key).await;

        metrics::histogram!(telemetry::REFRESH_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());

        match result {
            Ok(items) => {
                metrics::counter!(telemetry::REFRESHES_TOTAL, "status" => "ok").increment(1);
                info!(
                    items = items.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "catalog refreshed"
                );
                self.completed.send_replace(Some(items.clone()));
                Ok(RefreshOutcome::Refreshed(items))
            }
            Err(e) => {
                metrics::counter!(telemetry::REFRESHES_TOTAL, "status" => "error").increment(1);
                error!(error = %e, "catalog refresh failed, keeping previous generation");
                self.completed.send_replace(None);
                Err(e)
            }
        }
    }

    fn skipped(&self, reason: SkipReason) -> RefreshOutcome {
        metrics::counter!(telemetry::REFRESHES_SKIPPED_TOTAL, "reason" => reason.as_str())
            .increment(1);
        RefreshOutcome::Skipped(reason)
    }

    async fn rebuild(&self) -> Result<ItemSet> {
        let listed = fetch_all_items(self.source.as_ref(), &ItemFilter::active()).await?;
        let listed_count = listed.len();

        let candidates: Vec<CatalogItem> = listed
            .into_iter()
            .filter(|item| self.classifier.is_enrichable(item))
            .collect();
        info!(
            listed = listed_count,
            candidates = candidates.len(),
            "listing complete, enriching"
        );

        let plan = BatchPlan {
            batch_size: self.config.batch_size,
            pause: self.config.batch_pause,
        };
        let Enriched {
            items: enriched,
            degraded,
        } = enrich_items(self.source.as_ref(), candidates, plan).await;
        let known_kits = if degraded.is_empty() {
            HashSet::new()
        } else {
            warn!(degraded = degraded.len(), "publishing records without enrichment");
            self.previous_kit_ids().await
        };

        let kits: Vec<CatalogItem> = enriched
            .into_iter()
            .filter_map(|mut item| {
                item.classification = if degraded.contains(&item.item_id) {
                    carried_classification(&item, &known_kits)
                } else {
                    self.classifier.classify(&item)
                };
                matches!(
                    item.classification,
                    Classification::Kit | Classification::Unclassified
                )
                .then_some(item)
            })
            .collect();

        let items: ItemSet = Arc::new(kits);
        self.publish(&items).await;
        Ok(items)
    }

    async fn publish(&self, items: &ItemSet) {
        let ttl = self.policy.hard_ttl();
        set_json(self.store.as_ref(), &self.keys.catalog(), items.as_slice(), ttl).await;
        self.store
            .set(&self.keys.freshness(), now_millis().to_string(), ttl)
            .await;

        self.write_snapshot(items).await;
        self.record_image_changes(items).await;

        {
            let mut ids = self.kit_ids.write().await;
            *ids = items.iter().map(|item| item.item_id.clone()).collect();
        }

        self.generation.fetch_add(1, Ordering::SeqCst);
        self.dependents.invalidate(self.store.as_ref()).await;
    }

    /// Kit ids of the last generation, read from the published set (it
    /// carries classifications), else this process's kit-id set.
    async fn previous_kit_ids(&self) -> HashSet<String> {
        match get_json::<Vec<CatalogItem>>(self.store.as_ref(), &self.keys.catalog()).await {
            Some(items) => items
                .into_iter()
                .filter(|item| item.classification == Classification::Kit)
                .map(|item| item.item_id)
                .collect(),
            None => self.kit_ids().await,
        }
    }

    async fn write_snapshot(&self, items: &ItemSet) {
        let Some(snapshot) = self.snapshot.clone() else {
            return;
        };
        let items = Arc::clone(items);
        match tokio::task::spawn_blocking(move || snapshot.save(&items)).await {
            Ok(Ok(())) => debug!("snapshot written"),
            Ok(Err(e)) => warn!(error = %e, "failed to write snapshot"),
            Err(e) => warn!(error = %e, "snapshot writer task failed"),
        }
    }

    async fn record_image_changes(&self, items: &ItemSet) {
        let key = self.keys.image_fingerprints();
        let previous: ImageFingerprintMap = get_json(self.store.as_ref(), &key)
            .await
            .unwrap_or_default();
        let current = ImageFingerprintMap::from_items(items);
        let diff = current.diff(&previous);
        if !diff.is_empty() {
            info!(
                added = diff.added.len(),
                changed = diff.changed.len(),
                changed_ids = ?diff.changed,
                "product images changed upstream"
            );
        }
        set_json(self.store.as_ref(), &key, &current, self.policy.hard_ttl()).await;
    }
}

/// Classification of a record whose detail fetch failed.
///
/// Its type field is gone, so it keeps the kit status of the previous
/// generation, or stays unclassified when there is none.
fn carried_classification(item: &CatalogItem, known_kits: &HashSet<String>) -> Classification {
    if known_kits.contains(&item.item_id) {
        Classification::Kit
    } else {
        debug!(item = %item.name, item_id = %item.item_id, "publishing degraded item unclassified");
        Classification::Unclassified
    }
}
