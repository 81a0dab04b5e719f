// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for feed-engine.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The parent process is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `feed_engine_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `component`: write_path, publisher, feed_materializer, search_indexer, aggregator, cache
//! - `operation`: create, delete, get, set, pull, query
//! - `status`: success, error, hit, miss, degraded

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a pipeline operation outcome
pub fn record_operation(component: &str, operation: &str, status: &str) {
    counter!(
        "feed_engine_operations_total",
        "component" => component.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(component: &str, operation: &str, duration: Duration) {
    histogram!(
        "feed_engine_operation_seconds",
        "component" => component.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a fanout strategy decision
pub fn record_fanout_decision(strategy: &str) {
    counter!(
        "feed_engine_fanout_decisions_total",
        "strategy" => strategy.to_string()
    )
    .increment(1);
}

/// Record the terminal outcome of a publish sequence (delivered / dead_lettered)
pub fn record_publish(outcome: &str) {
    counter!(
        "feed_engine_publish_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a dead-letter append
pub fn record_dead_letter() {
    counter!("feed_engine_dead_letters_total").increment(1);
}

/// Set the number of dead letters awaiting offline reconciliation
pub fn set_dead_letter_pending(count: u64) {
    gauge!("feed_engine_dead_letter_pending").set(count as f64);
}

/// Record a circuit breaker call result (success / failure / timeout / rejected)
pub fn record_circuit_call(circuit: &str, outcome: &str) {
    counter!(
        "feed_engine_circuit_calls_total",
        "circuit" => circuit.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a consumed event by disposition (processed / malformed / deferred)
pub fn record_consumer_event(consumer: &str, status: &str) {
    counter!(
        "feed_engine_consumer_events_total",
        "consumer" => consumer.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
