// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the copy pipeline.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host binary is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `simpledb_copy_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `operation`: list_domains, domain_metadata, create_domain, delete_domain, select, batch_put
//! - `side`: read, write
//! - `domain`: source or target domain name

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a remote call outcome
pub fn record_remote_call(operation: &str, status: &str) {
    counter!(
        "simpledb_copy_remote_calls_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record remote call latency
pub fn record_latency(operation: &str, duration: Duration) {
    histogram!(
        "simpledb_copy_remote_call_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a scheduled retry
pub fn record_retry(operation: &str) {
    counter!(
        "simpledb_copy_retries_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a call that failed after its last allowed attempt
pub fn record_retry_exhausted(operation: &str) {
    counter!(
        "simpledb_copy_retries_exhausted_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Add provider-reported cost units
pub fn record_cost_units(side: &str, units: f64) {
    gauge!(
        "simpledb_copy_box_usage",
        "side" => side.to_string()
    )
    .increment(units);
}

// ═══════════════════════════════════════════════════════════════════════════
// BATCH WRITES - Bisection and quarantine
// ═══════════════════════════════════════════════════════════════════════════

/// Record a bulk write attempt
pub fn record_batch_write(domain: &str, size: usize, status: &str) {
    histogram!("simpledb_copy_batch_size").record(size as f64);
    counter!(
        "simpledb_copy_batch_writes_total",
        "domain" => domain.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a batch split after a write conflict
pub fn record_bisection(domain: &str, size: usize) {
    counter!(
        "simpledb_copy_bisections_total",
        "domain" => domain.to_string()
    )
    .increment(1);
    histogram!("simpledb_copy_bisected_batch_size").record(size as f64);
}

/// Record records excluded from the copy
pub fn record_quarantined(domain: &str, count: usize) {
    counter!(
        "simpledb_copy_quarantined_records_total",
        "domain" => domain.to_string()
    )
    .increment(count as u64);
}

// ═══════════════════════════════════════════════════════════════════════════
// PROGRESS - Records and domains
// ═══════════════════════════════════════════════════════════════════════════

/// Record records written to the target
pub fn record_records_copied(domain: &str, count: usize) {
    counter!(
        "simpledb_copy_records_copied_total",
        "domain" => domain.to_string()
    )
    .increment(count as u64);
}

/// Set copy progress for a domain (0 - 100)
pub fn set_domain_progress(domain: &str, percent: u64) {
    gauge!(
        "simpledb_copy_domain_progress_percent",
        "domain" => domain.to_string()
    )
    .set(percent as f64);
}

/// Record how a domain copy ended (copied, skipped, failed)
pub fn record_domain_outcome(outcome: &str) {
    counter!(
        "simpledb_copy_domains_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Track copy state machine transitions
pub fn set_copy_state(state: &str) {
    counter!(
        "simpledb_copy_state_transitions_total",
        "state" => state.to_string()
    )
    .increment(1);
}

/// A timing guard that records remote call latency on drop
pub struct LatencyTimer {
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.operation, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These verify the API doesn't panic without an installed recorder.

    #[test]
    fn test_remote_call_metrics() {
        record_remote_call("select", "success");
        record_remote_call("batch_put", "write_conflict");
        record_latency("select", Duration::from_millis(12));
        record_retry("list_domains");
        record_retry_exhausted("list_domains");
        record_cost_units("read", 0.0000219961);
    }

    #[test]
    fn test_batch_metrics() {
        record_batch_write("orders", 25, "success");
        record_bisection("orders", 25);
        record_quarantined("orders", 1);
    }

    #[test]
    fn test_progress_metrics() {
        record_records_copied("orders", 40);
        set_domain_progress("orders", 100);
        record_domain_outcome("copied");
        set_copy_state("Writing");
    }

    #[test]
    fn test_latency_timer() {
        {
            let _timer = LatencyTimer::new("select");
            std::thread::sleep(Duration::from_micros(10));
        }
    }
}
