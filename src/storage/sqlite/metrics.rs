//! Metrics recording for the `SQLite` store.

use std::time::Instant;

/// Records a counter and a latency histogram for one store operation.
///
/// `status` is `"success"`, `"rejected"` (constraint violation) or `"error"`.
pub fn record_operation_metrics(operation: &'static str, start: Instant, status: &'static str) {
    metrics::counter!(
        "store_operations_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "store_operation_duration_ms",
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}
