mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{MockInventory, ingredient, kit, listed, service};
use stockroom::store::{get_json, now_millis, set_json};
use stockroom::{
    CacheKeys, CacheStore, Catalog, CatalogItem, CatalogSource, Classification, MemoryStore,
    RefreshConfig, Snapshot, Stockroom, StockroomError, ViewConfig,
};

fn build(inventory: &Arc<MockInventory>, store: Arc<dyn CacheStore>) -> Catalog {
    Stockroom::builder()
        .source(inventory.clone())
        .store(store)
        .build()
        .unwrap()
}

fn ids(items: &[CatalogItem]) -> Vec<&str> {
    items.iter().map(|i| i.item_id.as_str()).collect()
}

fn cached_kit(id: &str, name: &str) -> CatalogItem {
    let mut item = CatalogItem::new(id, name);
    item.classification = Classification::Kit;
    item
}

async fn seed_cache(store: &dyn CacheStore, items: &[CatalogItem], written_at: Option<u64>) {
    let keys = CacheKeys::default();
    set_json(store, &keys.catalog(), items, Duration::from_secs(3600)).await;
    if let Some(ts) = written_at {
        store
            .set(&keys.freshness(), ts.to_string(), Duration::from_secs(3600))
            .await;
    }
}

/// Store whose backend is unreachable: every read misses, every write is
/// dropped, and locks fail open.
struct UnreachableStore;

#[async_trait]
impl CacheStore for UnreachableStore {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) {}

    async fn delete(&self, _key: &str) {}

    async fn acquire_lock(&self, _key: &str, _ttl: Duration) -> bool {
        true
    }

    async fn release_lock(&self, _key: &str) {}
}

#[tokio::test]
async fn cold_read_fetches_live_then_serves_hot() {
    let inventory = Arc::new(MockInventory::new().with_item(kit("1", "Cabernet Kit", "Wine")));
    let catalog = build(&inventory, Arc::new(MemoryStore::new()));

    let first = catalog.get_catalog().await.unwrap();
    assert_eq!(first.source, CatalogSource::Live);
    assert_eq!(ids(&first.items), vec!["1"]);

    let second = catalog.get_catalog().await.unwrap();
    assert_eq!(second.source, CatalogSource::Hot);
    assert_eq!(ids(&second.items), vec!["1"]);
    assert_eq!(inventory.list_calls(), 1);
}

#[tokio::test]
async fn stale_entry_is_served_and_refreshed_in_background() {
    let inventory = Arc::new(
        MockInventory::new()
            .with_item(kit("1", "Cabernet Kit", "Wine"))
            .with_item(kit("2", "Stout Kit", "Beer")),
    );
    let store = Arc::new(MemoryStore::new());
    let catalog = build(&inventory, store.clone());

    let eleven_minutes_ago = now_millis() - 11 * 60 * 1000;
    seed_cache(store.as_ref(), &[cached_kit("1", "Cabernet Kit")], Some(eleven_minutes_ago)).await;

    let mut completed = catalog.orchestrator().subscribe();
    let read = catalog.get_catalog().await.unwrap();
    assert_eq!(read.source, CatalogSource::Hot);
    assert_eq!(ids(&read.items), vec!["1"]);

    tokio::time::timeout(Duration::from_secs(5), completed.changed())
        .await
        .expect("background refresh did not finish")
        .unwrap();

    let refreshed: Vec<CatalogItem> = get_json(store.as_ref(), &CacheKeys::default().catalog())
        .await
        .unwrap();
    assert_eq!(ids(&refreshed), vec!["1", "2"]);

    let read = catalog.get_catalog().await.unwrap();
    assert_eq!(read.source, CatalogSource::Hot);
    assert_eq!(read.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_stale_readers_schedule_one_refresh() {
    let inventory = Arc::new(
        MockInventory::new()
            .with_item(kit("1", "Cabernet Kit", "Wine"))
            .list_delay(Duration::from_secs(1)),
    );
    let store = Arc::new(MemoryStore::new());
    let catalog = build(&inventory, store.clone());

    let eleven_minutes_ago = now_millis() - 11 * 60 * 1000;
    seed_cache(store.as_ref(), &[cached_kit("1", "Cabernet Kit")], Some(eleven_minutes_ago)).await;

    let mut completed = catalog.orchestrator().subscribe();
    let reads = tokio::join!(
        catalog.get_catalog(),
        catalog.get_catalog(),
        catalog.get_catalog(),
        catalog.get_catalog(),
        catalog.get_catalog(),
    );
    for read in [reads.0, reads.1, reads.2, reads.3, reads.4] {
        assert_eq!(read.unwrap().source, CatalogSource::Hot);
    }

    tokio::time::timeout(Duration::from_secs(30), completed.changed())
        .await
        .expect("background refresh did not finish")
        .unwrap();
    // Let every spawned refresh task run to completion.
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(inventory.list_calls(), 1);
}

#[tokio::test]
async fn fresh_entry_does_not_trigger_refresh() {
    let inventory = Arc::new(MockInventory::new().with_item(kit("1", "Cabernet Kit", "Wine")));
    let store = Arc::new(MemoryStore::new());
    let catalog = build(&inventory, store.clone());

    seed_cache(store.as_ref(), &[cached_kit("1", "Cabernet Kit")], Some(now_millis())).await;

    let read = catalog.get_catalog().await.unwrap();
    assert_eq!(read.source, CatalogSource::Hot);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(inventory.list_calls(), 0);
}

#[tokio::test]
async fn missing_timestamp_counts_as_stale() {
    let inventory = Arc::new(MockInventory::new().with_item(kit("1", "Cabernet Kit", "Wine")));
    let store = Arc::new(MemoryStore::new());
    let catalog = build(&inventory, store.clone());

    seed_cache(store.as_ref(), &[cached_kit("1", "Cabernet Kit")], None).await;

    let mut completed = catalog.orchestrator().subscribe();
    let read = catalog.get_catalog().await.unwrap();
    assert_eq!(read.source, CatalogSource::Hot);

    tokio::time::timeout(Duration::from_secs(5), completed.changed())
        .await
        .expect("background refresh did not start")
        .unwrap();
    assert_eq!(inventory.list_calls(), 1);
}

#[tokio::test]
async fn hot_hit_seeds_kit_ids() {
    let inventory = Arc::new(MockInventory::new());
    let store = Arc::new(MemoryStore::new());
    let catalog = build(&inventory, store.clone());

    seed_cache(store.as_ref(), &[cached_kit("1", "Cabernet Kit")], Some(now_millis())).await;
    catalog.get_catalog().await.unwrap();

    assert!(catalog.orchestrator().is_kit("1").await);
}

#[tokio::test]
async fn snapshot_backfills_empty_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("products-cache.json");
    Snapshot::new(&path)
        .save(&[cached_kit("1", "Cabernet Kit"), cached_kit("2", "Stout Kit")])
        .unwrap();

    let inventory = Arc::new(MockInventory::new());
    inventory.set_listing_fails(true);
    let store = Arc::new(MemoryStore::new());
    let catalog = Stockroom::builder()
        .source(inventory.clone())
        .store(store.clone())
        .snapshot(&path)
        .build()
        .unwrap();

    let read = catalog.get_catalog().await.unwrap();
    assert_eq!(read.source, CatalogSource::Snapshot);
    assert_eq!(ids(&read.items), vec!["1", "2"]);

    let keys = CacheKeys::default();
    let cached: Vec<CatalogItem> = get_json(store.as_ref(), &keys.catalog()).await.unwrap();
    assert_eq!(ids(&cached), vec!["1", "2"]);
    assert!(store.get(&keys.freshness()).await.is_some());
    assert!(catalog.orchestrator().is_kit("2").await);

    // The next read is a hot hit even though the background refresh failed.
    let read = catalog.get_catalog().await.unwrap();
    assert_eq!(read.source, CatalogSource::Hot);
}

#[tokio::test]
async fn empty_snapshot_falls_through_to_live() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("products-cache.json");
    Snapshot::new(&path).save(&[]).unwrap();

    let inventory = Arc::new(MockInventory::new().with_item(kit("1", "Cabernet Kit", "Wine")));
    let catalog = Stockroom::builder()
        .source(inventory.clone())
        .snapshot(&path)
        .build()
        .unwrap();

    let read = catalog.get_catalog().await.unwrap();
    assert_eq!(read.source, CatalogSource::Live);
}

#[tokio::test]
async fn unreachable_store_fails_open() {
    let inventory = Arc::new(MockInventory::new().with_item(kit("1", "Cabernet Kit", "Wine")));
    let catalog = build(&inventory, Arc::new(UnreachableStore));

    let first = catalog.get_catalog().await.unwrap();
    let second = catalog.get_catalog().await.unwrap();

    assert_eq!(first.source, CatalogSource::Live);
    assert_eq!(second.source, CatalogSource::Live);
    assert_eq!(ids(&second.items), vec!["1"]);
    assert_eq!(inventory.list_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_cold_readers_share_one_refresh() {
    let inventory = Arc::new(
        MockInventory::new()
            .with_item(kit("1", "Cabernet Kit", "Wine"))
            .list_delay(Duration::from_secs(2)),
    );
    // Slow polling so waiters can only be released by the in-process notification.
    let catalog = Stockroom::builder()
        .source(inventory.clone())
        .cold_poll_interval(Duration::from_secs(60))
        .build()
        .unwrap();

    let (a, b, c) = tokio::join!(
        catalog.get_catalog(),
        catalog.get_catalog(),
        catalog.get_catalog()
    );

    for read in [a.unwrap(), b.unwrap(), c.unwrap()] {
        assert_eq!(read.source, CatalogSource::Live);
        assert_eq!(ids(&read.items), vec!["1"]);
    }
    assert_eq!(inventory.list_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn cold_reader_waits_for_another_replica() {
    let inventory = Arc::new(
        MockInventory::new()
            .with_item(kit("1", "Cabernet Kit", "Wine"))
            .list_delay(Duration::from_secs(3)),
    );
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let replica_a = build(&inventory, store.clone());
    let replica_b = build(&inventory, store.clone());

    let (a, b) = tokio::join!(replica_a.get_catalog(), replica_b.get_catalog());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(ids(&a.items), vec!["1"]);
    assert_eq!(ids(&b.items), vec!["1"]);
    assert_eq!(inventory.list_calls(), 1);
    // One replica refreshed; the other picked the result up from the store.
    let mut sources = [a.source, b.source];
    sources.sort_by_key(|s| s.as_str());
    assert_eq!(sources, [CatalogSource::Hot, CatalogSource::Live]);
}

#[tokio::test(start_paused = true)]
async fn cold_reader_gives_up_after_lock_ttl() {
    let inventory = Arc::new(MockInventory::new().with_item(kit("1", "Cabernet Kit", "Wine")));
    let store = Arc::new(MemoryStore::new());
    let catalog = Stockroom::builder()
        .source(inventory.clone())
        .store(store.clone())
        .refresh(RefreshConfig::new().lock_ttl(Duration::from_secs(5)))
        .build()
        .unwrap();

    // A replica that took the lock and died.
    let lock_key = CacheKeys::default().lock("products:refresh");
    assert!(store.acquire_lock(&lock_key, Duration::from_secs(3600)).await);

    let err = catalog.get_catalog().await.unwrap_err();
    assert!(matches!(err, StockroomError::CatalogUnavailable));
    assert_eq!(inventory.list_calls(), 0);
}

#[tokio::test]
async fn failed_live_refresh_is_surfaced() {
    let inventory = Arc::new(MockInventory::new().with_item(kit("1", "Cabernet Kit", "Wine")));
    inventory.set_listing_fails(true);
    let catalog = build(&inventory, Arc::new(MemoryStore::new()));

    let err = catalog.get_catalog().await.unwrap_err();
    assert!(matches!(err, StockroomError::Http(_)));
    assert!(!catalog.orchestrator().is_refreshing());
}

#[tokio::test]
async fn invalidate_forces_rebuild() {
    let inventory = Arc::new(MockInventory::new().with_item(kit("1", "Cabernet Kit", "Wine")));
    let store = Arc::new(MemoryStore::new());
    let catalog = build(&inventory, store.clone());

    catalog.get_catalog().await.unwrap();
    catalog.invalidate().await;

    let keys = CacheKeys::default();
    assert!(store.get(&keys.catalog()).await.is_none());
    assert!(store.get(&keys.freshness()).await.is_none());

    let read = catalog.get_catalog().await.unwrap();
    assert_eq!(read.source, CatalogSource::Live);
    assert_eq!(inventory.list_calls(), 2);
}

#[tokio::test]
async fn ingredients_exclude_kits_services_and_unpriced_goods() {
    let mut unpriced = listed("6", "Carboy");
    unpriced.rate = Some(0.0);
    let inventory = Arc::new(
        MockInventory::new()
            .with_item(kit("1", "Cabernet Kit", "Wine"))
            .with_item(ingredient("2", "Corn Sugar", 4.99))
            .with_item(ingredient("3", "Yeast Nutrient", 6.49))
            .with_item(service("4", "Bottling"))
            .with_item((unpriced, Default::default())),
    );
    let catalog = build(&inventory, Arc::new(MemoryStore::new()));
    catalog.get_catalog().await.unwrap();

    let read = catalog.ingredients().await.unwrap();
    assert_eq!(read.source, CatalogSource::Live);
    assert_eq!(ids(&read.items), vec!["2", "3"]);
    assert!(
        read.items
            .iter()
            .all(|i| i.classification == Classification::Ingredient)
    );
    assert_eq!(read.items[0].tax_name, "GST");

    let again = catalog.ingredients().await.unwrap();
    assert_eq!(again.source, CatalogSource::Hot);
}

#[tokio::test]
async fn refresh_drops_cached_ingredients() {
    let inventory = Arc::new(
        MockInventory::new()
            .with_item(kit("1", "Cabernet Kit", "Wine"))
            .with_item(ingredient("2", "Corn Sugar", 4.99)),
    );
    let catalog = build(&inventory, Arc::new(MemoryStore::new()));
    catalog.get_catalog().await.unwrap();
    assert_eq!(catalog.ingredients().await.unwrap().source, CatalogSource::Live);

    catalog.orchestrator().refresh().await.unwrap();

    assert_eq!(catalog.ingredients().await.unwrap().source, CatalogSource::Live);
}

#[tokio::test]
async fn restarted_replica_excludes_kits_from_ingredients() {
    let inventory = Arc::new(
        MockInventory::new()
            .with_item(kit("1", "Cabernet Kit", "Wine"))
            .with_item(ingredient("2", "Corn Sugar", 4.99)),
    );
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let first = build(&inventory, store.clone());
    first.get_catalog().await.unwrap();

    let restarted = build(&inventory, store.clone());
    assert_eq!(
        restarted.get_catalog().await.unwrap().source,
        CatalogSource::Hot
    );

    let read = restarted.ingredients().await.unwrap();
    assert_eq!(ids(&read.items), vec!["2"]);
}

#[tokio::test]
async fn services_view_lists_only_services() {
    let inventory = Arc::new(
        MockInventory::new()
            .with_item(kit("1", "Cabernet Kit", "Wine"))
            .with_item(service("2", "Bottling"))
            .with_item(service("3", "Equipment Rental")),
    );
    let catalog = build(&inventory, Arc::new(MemoryStore::new()));

    let read = catalog.services().await.unwrap();
    assert_eq!(read.source, CatalogSource::Live);
    assert_eq!(ids(&read.items), vec!["2", "3"]);
    assert_eq!(inventory.detail_calls(), 0);

    let again = catalog.services().await.unwrap();
    assert_eq!(again.source, CatalogSource::Hot);
    assert_eq!(inventory.list_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_during_ingredients_rebuild_is_not_overwritten() {
    let inventory = Arc::new(
        MockInventory::new()
            .with_item(kit("1", "Cabernet Kit", "Wine"))
            .with_item(ingredient("2", "Corn Sugar", 4.99)),
    );
    let store = Arc::new(MemoryStore::new());
    let catalog = Stockroom::builder()
        .source(inventory.clone())
        .store(store.clone())
        .refresh(RefreshConfig::new().batch_size(1))
        .views(ViewConfig {
            ttl: Duration::from_secs(300),
            ingredient_batch_pause: Duration::from_secs(10),
        })
        .build()
        .unwrap();

    // No refresh has run yet, so this rebuild cannot tell the kit apart.
    let rebuild = tokio::spawn({
        let catalog = catalog.clone();
        async move { catalog.ingredients().await }
    });
    tokio::task::yield_now().await;
    catalog.orchestrator().refresh().await.unwrap();
    let stale = rebuild.await.unwrap().unwrap();
    assert_eq!(ids(&stale.items), vec!["1", "2"]);

    let key = CacheKeys::default().ingredients();
    assert_eq!(store.get(&key).await, None);

    let read = catalog.ingredients().await.unwrap();
    assert_eq!(read.source, CatalogSource::Live);
    assert_eq!(ids(&read.items), vec!["2"]);
}
