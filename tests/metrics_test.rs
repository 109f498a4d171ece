//! Metrics emitted by the refresh and read paths.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

mod common;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

use common::{MockInventory, kit};
use stockroom::upstream::RetryConfig;
use stockroom::{Catalog, MemoryStore, RefreshConfig, Stockroom, telemetry};

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a name and, optionally, one label.
fn counter_total(snapshot: &SnapshotVec, name: &str, label: Option<(&str, &str)>) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .filter(|(key, _, _, _)| {
            label.map_or(true, |(k, v)| {
                key.key()
                    .labels()
                    .any(|l| l.key() == k && l.value() == v)
            })
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

/// Drive `fut` to completion with `recorder` installed on this thread.
///
/// `block_in_place` keeps the sync `with_local_recorder` closure on the
/// current thread while `block_on` drives the inner async work.
fn recorded<F: Future>(recorder: &DebuggingRecorder, fut: F) -> F::Output {
    metrics::with_local_recorder(recorder, || {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
    })
}

fn snapshot(snapshotter: &Snapshotter) -> SnapshotVec {
    snapshotter.snapshot().into_vec()
}

fn build(inventory: &Arc<MockInventory>) -> Catalog {
    Stockroom::builder()
        .source(inventory.clone())
        .store(Arc::new(MemoryStore::new()))
        .refresh(
            RefreshConfig::new()
                .batch_pause(Duration::from_millis(1))
                .retry(RetryConfig::new().initial_delay(Duration::from_millis(1))),
        )
        .build()
        .unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn successful_refresh_records_outcome_and_duration() {
    let inventory = Arc::new(MockInventory::new().with_item(kit("1", "Cabernet Kit", "Wine")));
    let catalog = build(&inventory);
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = recorded(&recorder, catalog.orchestrator().refresh());
    assert!(result.is_ok());

    let snapshot = snapshot(&snapshotter);
    assert_eq!(
        counter_total(&snapshot, telemetry::REFRESHES_TOTAL, Some(("status", "ok"))),
        1
    );
    assert_eq!(
        counter_total(&snapshot, telemetry::REFRESHES_TOTAL, Some(("status", "error"))),
        0
    );
    assert!(has_histogram(&snapshot, telemetry::REFRESH_DURATION_SECONDS));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn failed_refresh_records_error() {
    let inventory = Arc::new(MockInventory::new());
    inventory.set_listing_fails(true);
    let catalog = build(&inventory);
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = recorded(&recorder, catalog.orchestrator().refresh());
    assert!(result.is_err());

    let snapshot = snapshot(&snapshotter);
    assert_eq!(
        counter_total(&snapshot, telemetry::REFRESHES_TOTAL, Some(("status", "error"))),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn held_lock_records_skip_reason() {
    let inventory = Arc::new(MockInventory::new().with_item(kit("1", "Cabernet Kit", "Wine")));
    let store = Arc::new(MemoryStore::new());
    let catalog = Stockroom::builder()
        .source(inventory.clone())
        .store(store.clone())
        .build()
        .unwrap();
    let lock = stockroom::CacheKeys::default().lock("products:refresh");
    stockroom::CacheStore::acquire_lock(store.as_ref(), &lock, Duration::from_secs(60)).await;

    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorded(&recorder, catalog.orchestrator().refresh()).unwrap();

    let snapshot = snapshot(&snapshotter);
    assert_eq!(
        counter_total(
            &snapshot,
            telemetry::REFRESHES_SKIPPED_TOTAL,
            Some(("reason", "lock_held"))
        ),
        1
    );
    assert_eq!(counter_total(&snapshot, telemetry::REFRESHES_TOTAL, None), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn reads_are_counted_by_source() {
    let inventory = Arc::new(MockInventory::new().with_item(kit("1", "Cabernet Kit", "Wine")));
    let catalog = build(&inventory);
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    recorded(&recorder, async {
        catalog.get_catalog().await.unwrap();
        catalog.get_catalog().await.unwrap();
    });

    let snapshot = snapshot(&snapshotter);
    assert_eq!(
        counter_total(&snapshot, telemetry::READS_TOTAL, Some(("source", "zoho"))),
        1
    );
    assert_eq!(
        counter_total(&snapshot, telemetry::READS_TOTAL, Some(("source", "cache"))),
        1
    );
    assert_eq!(
        counter_total(&snapshot, telemetry::READS_TOTAL, Some(("view", "products"))),
        2
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn retries_and_degraded_records_are_counted() {
    let inventory = Arc::new(
        MockInventory::new()
            .with_item(kit("1", "Cabernet Kit", "Wine"))
            .with_item(kit("2", "Stout Kit", "Beer"))
            .rate_limited("1", 1)
            .failing_detail("2"),
    );
    let catalog = build(&inventory);
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    recorded(&recorder, catalog.orchestrator().refresh()).unwrap();

    let snapshot = snapshot(&snapshotter);
    assert_eq!(counter_total(&snapshot, telemetry::DETAIL_RETRIES_TOTAL, None), 1);
    assert_eq!(
        counter_total(&snapshot, telemetry::ENRICHMENT_DEGRADED_TOTAL, None),
        1
    );
}

#[tokio::test]
async fn no_recorder_is_a_noop() {
    let inventory = Arc::new(MockInventory::new().with_item(kit("1", "Cabernet Kit", "Wine")));
    let catalog = build(&inventory);

    assert!(catalog.orchestrator().refresh().await.is_ok());
    assert!(catalog.get_catalog().await.is_ok());
}
