//! Telemetry metric name constants.
//!
//! Centralised metric names for stockroom operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `stockroom_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `status`: outcome: "ok" or "error"
//! - `source`: where a read was served from: "cache", "file-cache", "zoho"
//! - `view`: dataset name: "products", "ingredients", "services"
//! - `operation`: store operation: "get", "set", "delete", "acquire_lock", "release_lock"

/// Refresh attempts that held the lock and ran to completion or failure.
///
/// Labels: `status` ("ok" | "error").
pub const REFRESHES_TOTAL: &str = "stockroom_refreshes_total";

/// Refresh duration in seconds (lock held).
pub const REFRESH_DURATION_SECONDS: &str = "stockroom_refresh_duration_seconds";

/// Refresh calls that returned without fetching.
///
/// Labels: `reason` ("in_progress" | "lock_held").
pub const REFRESHES_SKIPPED_TOTAL: &str = "stockroom_refreshes_skipped_total";

/// Detail fetch retries after a rate-limited response (not counting the
/// initial request).
pub const DETAIL_RETRIES_TOTAL: &str = "stockroom_detail_retries_total";

/// Records kept with defaulted enrichment because their detail fetch failed.
pub const ENRICHMENT_DEGRADED_TOTAL: &str = "stockroom_enrichment_degraded_total";

/// Catalog reads served.
///
/// Labels: `view`, `source`.
pub const READS_TOTAL: &str = "stockroom_reads_total";

/// Store operations that degraded to their safe default.
///
/// Labels: `operation`.
pub const STORE_DEGRADED_TOTAL: &str = "stockroom_store_degraded_total";
