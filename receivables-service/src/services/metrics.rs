//! Prometheus metrics for receivables-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Histogram for database query duration by operation.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "receivables_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Counter for receivables created, by type.
pub static RECEIVABLES_CREATED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "receivables_created_total",
        "Total number of receivables created",
        &["receivable_type"]
    )
    .expect("Failed to register RECEIVABLES_CREATED")
});

/// Counter for recorded payment lines, by method.
pub static TRANSACTIONS_RECORDED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "receivables_transactions_recorded_total",
        "Total number of payment lines recorded",
        &["method"]
    )
    .expect("Failed to register TRANSACTIONS_RECORDED")
});

/// Counter for derived status transitions, by resulting status.
pub static STATUS_TRANSITIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "receivables_status_transitions_total",
        "Total number of receivable status updates applied",
        &["status"]
    )
    .expect("Failed to register STATUS_TRANSITIONS")
});

/// Counter for errors.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "receivables_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&RECEIVABLES_CREATED);
    Lazy::force(&TRANSACTIONS_RECORDED);
    Lazy::force(&STATUS_TRANSITIONS);
    Lazy::force(&ERRORS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}

/// Record a created receivable.
pub fn record_receivable_created(receivable_type: &str) {
    RECEIVABLES_CREATED
        .with_label_values(&[receivable_type])
        .inc();
}

/// Record an inserted payment line.
pub fn record_transaction_recorded(method: &str) {
    TRANSACTIONS_RECORDED.with_label_values(&[method]).inc();
}

/// Record an applied status update.
pub fn record_status_transition(status: &str) {
    STATUS_TRANSITIONS.with_label_values(&[status]).inc();
}

/// Record an error.
pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}
