// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for catalog-sync.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `catalog_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `store`: legacy, remote
//! - `operation`: index, unindex, search, refresh, ...
//! - `status`: success, not_found, timeout, unavailable, rejected, error

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a store operation
pub fn record_operation(store: &str, operation: &str, status: &str) {
    counter!(
        "catalog_sync_operations_total",
        "store" => store.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(store: &str, operation: &str, duration: Duration) {
    histogram!(
        "catalog_sync_operation_seconds",
        "store" => store.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record the mode each engine call resolved to
pub fn record_mode(operation: &str, mode: &str) {
    counter!(
        "catalog_sync_dispatch_total",
        "operation" => operation.to_string(),
        "mode" => mode.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// SEARCH
// ═══════════════════════════════════════════════════════════════════════════

/// Record a search query execution
pub fn record_search_query(source: &str, status: &str) {
    counter!(
        "catalog_sync_search_queries_total",
        "source" => source.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a remote search failure that was absorbed
pub fn record_search_fallback(mode: &str) {
    counter!(
        "catalog_sync_search_fallbacks_total",
        "mode" => mode.to_string()
    )
    .increment(1);
}

/// Record search result count
pub fn record_search_results(count: usize) {
    histogram!("catalog_sync_search_results").record(count as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// TRANSACTIONS
// ═══════════════════════════════════════════════════════════════════════════

/// Set operations recorded by the unit of work that just finished
pub fn set_pending_operations(count: usize) {
    gauge!("catalog_sync_pending_operations").set(count as f64);
}

/// Record how a unit of work ended: committed, aborted, dropped, failed
pub fn record_transaction(outcome: &str) {
    counter!(
        "catalog_sync_transactions_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// SCHEMA
// ═══════════════════════════════════════════════════════════════════════════

/// Record remote index provisioning
pub fn record_schema_provision(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "catalog_sync_schema_provision_total",
        "status" => status
    )
    .increment(1);
}

/// Record a full rebuild or clear
pub fn record_maintenance(operation: &str, mode: &str, objects: usize) {
    counter!(
        "catalog_sync_maintenance_total",
        "operation" => operation.to_string(),
        "mode" => mode.to_string()
    )
    .increment(1);
    histogram!(
        "catalog_sync_maintenance_objects",
        "operation" => operation.to_string()
    )
    .record(objects as f64);
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    store: &'static str,
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(store: &'static str, operation: &'static str) -> Self {
        Self {
            store,
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.store, self.operation, self.start.elapsed());
    }
}
