//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all RentLedger metrics
pub const METRICS_PREFIX: &str = "rentledger";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_payments_recorded_total", METRICS_PREFIX),
        Unit::Count,
        "Payments written"
    );

    describe_counter!(
        format!("{}_payment_amount_total", METRICS_PREFIX),
        Unit::Count,
        "Sum of recorded payment amounts"
    );

    describe_counter!(
        format!("{}_cascade_deletes_total", METRICS_PREFIX),
        Unit::Count,
        "Cascading deletes started"
    );

    describe_counter!(
        format!("{}_cascade_documents_deleted_total", METRICS_PREFIX),
        Unit::Count,
        "Documents removed by cascading deletes"
    );

    describe_counter!(
        format!("{}_partial_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Workflows that failed after committing some writes"
    );

    describe_counter!(
        format!("{}_notifications_sent_total", METRICS_PREFIX),
        Unit::Count,
        "Push messages delivered"
    );

    describe_counter!(
        format!("{}_push_tokens_pruned_total", METRICS_PREFIX),
        Unit::Count,
        "Device tokens removed after an invalid-token response"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

pub fn record_payment(amount: f64, payment_type: &str) {
    counter!(
        format!("{}_payments_recorded_total", METRICS_PREFIX),
        "type" => payment_type.to_string()
    )
    .increment(1);

    // Counters are integral; amounts are tracked in whole currency units
    counter!(format!("{}_payment_amount_total", METRICS_PREFIX)).increment(amount.max(0.0).round() as u64);
}

pub fn record_cascade(kind: &str, documents_deleted: usize) {
    counter!(
        format!("{}_cascade_deletes_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);

    counter!(
        format!("{}_cascade_documents_deleted_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(documents_deleted as u64);
}

pub fn record_partial_failure(operation: &str) {
    counter!(
        format!("{}_partial_failures_total", METRICS_PREFIX),
        "operation" => operation.to_string()
    )
    .increment(1);
}

pub fn record_notifications(sent: usize, pruned: usize) {
    counter!(format!("{}_notifications_sent_total", METRICS_PREFIX)).increment(sent as u64);
    counter!(format!("{}_push_tokens_pruned_total", METRICS_PREFIX)).increment(pruned as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_helpers_without_recorder() {
        // No recorder installed: calls are no-ops and must not panic
        RequestMetrics::start("POST", "/api/payments").finish(201);
        record_payment(200000.0, "rent");
        record_cascade("property", 5);
        record_notifications(2, 1);
    }
}
