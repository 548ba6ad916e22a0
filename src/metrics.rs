// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
    increment_counter, Unit,
};

// NOTE: When observability feature is disabled, provide stub implementations
#[cfg(not(feature = "observability"))]
pub enum Unit {}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! counter {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
    ($name:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! gauge {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! histogram {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! increment_counter {
    ($name:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_gauge {
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_histogram {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
use crate::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
    increment_counter,
};

/// Initializes the descriptions for all the metrics in the application.
/// This should be called once at startup.
pub fn describe_metrics() {
    describe_counter!(
        "sdk_rpc_requests_total",
        Unit::Count,
        "Total RPC requests issued, labeled by operation."
    );
    describe_counter!(
        "sdk_rpc_retries_total",
        Unit::Count,
        "Total retried RPC/HTTP attempts, labeled by operation."
    );
    describe_counter!(
        "sdk_rpc_errors_total",
        Unit::Count,
        "Total terminal provider errors, labeled by operation."
    );
    describe_histogram!(
        "sdk_fetch_duration_seconds",
        Unit::Seconds,
        "End-to-end duration of a resilient fetch, retries included."
    );

    describe_counter!(
        "sdk_cache_hits_total",
        Unit::Count,
        "Total cache hits, labeled by cache name."
    );
    describe_counter!(
        "sdk_cache_miss_total",
        Unit::Count,
        "Total cache misses, labeled by cache name."
    );
    describe_counter!(
        "sdk_cache_stale_served_total",
        Unit::Count,
        "Total responses served from expired cache entries."
    );
    describe_counter!(
        "sdk_background_refresh_total",
        Unit::Count,
        "Total detached cache refreshes spawned, labeled by result."
    );

    describe_counter!(
        "sdk_marketplace_pages_total",
        Unit::Count,
        "Total marketplace event pages fetched."
    );
    describe_gauge!(
        "sdk_enrichment_coverage",
        "Fraction of transfers matched to a sale price in the last enrichment (0.0-1.0)."
    );
    describe_gauge!(
        "sdk_snapshot_transfers",
        "Number of transfers in the last built market snapshot."
    );
    describe_gauge!(
        "sdk_snapshot_sales",
        "Number of enriched sales in the last built market snapshot."
    );
    describe_histogram!(
        "sdk_snapshot_build_seconds",
        Unit::Seconds,
        "Duration of a full market snapshot build."
    );
}

// --- Helper functions to update metrics ---

pub fn increment_rpc_request(operation: &str) {
    counter!("sdk_rpc_requests_total", 1, "operation" => operation.to_string());
}

pub fn increment_rpc_retry(operation: &str) {
    counter!("sdk_rpc_retries_total", 1, "operation" => operation.to_string());
}

pub fn increment_rpc_error(operation: &str) {
    counter!("sdk_rpc_errors_total", 1, "operation" => operation.to_string());
}

pub fn record_fetch_duration(duration: std::time::Duration) {
    histogram!("sdk_fetch_duration_seconds", duration.as_secs_f64());
}

pub fn increment_cache_hit(cache_name: &str) {
    counter!("sdk_cache_hits_total", 1, "cache" => cache_name.to_string());
}

pub fn increment_cache_miss(cache_name: &str) {
    counter!("sdk_cache_miss_total", 1, "cache" => cache_name.to_string());
}

pub fn increment_stale_served() {
    increment_counter!("sdk_cache_stale_served_total");
}

pub fn increment_background_refresh(result: &str) {
    counter!("sdk_background_refresh_total", 1, "result" => result.to_string());
}

pub fn increment_marketplace_pages(count: u64) {
    counter!("sdk_marketplace_pages_total", count);
}

pub fn set_enrichment_coverage(coverage: f64) {
    gauge!("sdk_enrichment_coverage", coverage);
}

pub fn set_snapshot_sizes(transfers: usize, sales: usize) {
    gauge!("sdk_snapshot_transfers", transfers as f64);
    gauge!("sdk_snapshot_sales", sales as f64);
}

pub fn record_snapshot_build(duration: std::time::Duration) {
    histogram!("sdk_snapshot_build_seconds", duration.as_secs_f64());
}
