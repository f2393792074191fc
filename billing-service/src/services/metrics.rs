//! Prometheus metrics for billing operations and the billing workflow.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "billing_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Billing operations counter (created / line_item_added / closed / summary_read)
pub static BILLING_OPERATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Workflow signal counter by signal name
pub static WORKFLOW_SIGNALS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Error counter for alerting
pub static ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Call once at startup.
pub fn init_metrics() {
    BILLING_OPERATIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billing_operations_total",
                "Total billing operations by type"
            ),
            &["operation"]
        )
        .expect("Failed to register BILLING_OPERATIONS_TOTAL")
    });

    WORKFLOW_SIGNALS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billing_workflow_signals_total",
                "Total signals delivered to billing workflows"
            ),
            &["signal"]
        )
        .expect("Failed to register WORKFLOW_SIGNALS_TOTAL")
    });

    ERRORS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("billing_errors_total", "Total errors by type for alerting"),
            &["error_type", "operation"]
        )
        .expect("Failed to register ERRORS_TOTAL")
    });
}

/// Record a billing operation.
pub fn record_billing_operation(operation: &str) {
    if let Some(counter) = BILLING_OPERATIONS_TOTAL.get() {
        counter.with_label_values(&[operation]).inc();
    }
}

/// Record a signal delivered to a billing workflow.
pub fn record_workflow_signal(signal: &str) {
    if let Some(counter) = WORKFLOW_SIGNALS_TOTAL.get() {
        counter.with_label_values(&[signal]).inc();
    }
}

/// Record an error for alerting.
pub fn record_error(error_type: &str, operation: &str) {
    if let Some(counter) = ERRORS_TOTAL.get() {
        counter.with_label_values(&[error_type, operation]).inc();
    }
}

/// Render all registered metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
