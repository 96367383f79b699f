//! Metrics module for forwarding-service.
//! Provides Prometheus metrics for request lifecycle and payment operations.

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
            "forwarding_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Request lifecycle operations counter
pub static REQUEST_OPERATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Payment operations counter
pub static PAYMENT_OPERATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Status transitions counter
pub static STATUS_TRANSITIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Notification dispatch counter
pub static NOTIFICATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Error counter for alerting
pub static ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Call once at startup.
pub fn init_metrics() {
    REQUEST_OPERATIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "forwarding_request_operations_total",
                "Total request lifecycle operations by type"
            ),
            &["operation"]
        )
        .expect("Failed to register REQUEST_OPERATIONS_TOTAL")
    });

    PAYMENT_OPERATIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "forwarding_payment_operations_total",
                "Total payment operations by type and outcome"
            ),
            &["operation", "outcome"]
        )
        .expect("Failed to register PAYMENT_OPERATIONS_TOTAL")
    });

    STATUS_TRANSITIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "forwarding_status_transitions_total",
                "Total request status transitions by target status"
            ),
            &["status"]
        )
        .expect("Failed to register STATUS_TRANSITIONS_TOTAL")
    });

    NOTIFICATIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "forwarding_notifications_total",
                "Total notification dispatches by event and result"
            ),
            &["event", "result"]
        )
        .expect("Failed to register NOTIFICATIONS_TOTAL")
    });

    ERRORS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "forwarding_errors_total",
                "Total errors by component for alerting"
            ),
            &["component"]
        )
        .expect("Failed to register ERRORS_TOTAL")
    });
}

/// Record a request lifecycle operation.
pub fn record_request_operation(operation: &str) {
    if let Some(counter) = REQUEST_OPERATIONS_TOTAL.get() {
        counter.with_label_values(&[operation]).inc();
    }
}

/// Record a payment operation with its outcome.
pub fn record_payment_operation(operation: &str, outcome: &str) {
    if let Some(counter) = PAYMENT_OPERATIONS_TOTAL.get() {
        counter.with_label_values(&[operation, outcome]).inc();
    }
}

/// Record a status transition.
pub fn record_status_transition(status: &str) {
    if let Some(counter) = STATUS_TRANSITIONS_TOTAL.get() {
        counter.with_label_values(&[status]).inc();
    }
}

/// Record a notification dispatch result.
pub fn record_notification(event: &str, result: &str) {
    if let Some(counter) = NOTIFICATIONS_TOTAL.get() {
        counter.with_label_values(&[event, result]).inc();
    }
}

/// Record an error for alerting.
pub fn record_error(component: &str) {
    if let Some(counter) = ERRORS_TOTAL.get() {
        counter.with_label_values(&[component]).inc();
    }
}

/// Render all registered metrics in the Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
