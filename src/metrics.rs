/// Metrics and telemetry
///
/// Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Uploads and stored bytes
/// - Webhook processing
/// - Background job execution
/// - Moderation actions

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // ========== Upload Metrics ==========

    /// Uploads by MIME type
    pub static ref UPLOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "uploads_total",
        "Total number of completed uploads",
        &["mime_type"]
    )
    .unwrap();

    /// Uploads rejected at the admission gate, by reason
    pub static ref UPLOADS_REJECTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "uploads_rejected_total",
        "Total number of uploads rejected before storage",
        &["reason"]
    )
    .unwrap();

    /// Bytes currently stored across all users
    pub static ref STORAGE_BYTES_TOTAL: IntGauge = register_int_gauge!(
        "storage_bytes_total",
        "Total size of stored uploads in bytes"
    )
    .unwrap();

    /// Total stored assets
    pub static ref ASSETS_TOTAL: IntGauge = register_int_gauge!(
        "assets_total",
        "Total number of stored assets"
    )
    .unwrap();

    // ========== Account Metrics ==========

    /// Account creations
    pub static ref ACCOUNT_CREATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "account_creations_total",
        "Total number of accounts created",
        &["status"]
    )
    .unwrap();

    /// Total accounts
    pub static ref ACCOUNTS_TOTAL: IntGauge = register_int_gauge!(
        "accounts_total",
        "Total number of accounts"
    )
    .unwrap();

    // ========== Billing Metrics ==========

    /// Webhook events by type and outcome
    pub static ref WEBHOOK_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "webhook_events_total",
        "Total number of billing webhook events processed",
        &["event_type", "outcome"]
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();

    /// Background job duration in seconds
    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "background_job_duration_seconds",
        "Background job execution time in seconds",
        &["job_type"],
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    )
    .unwrap();

    // ========== Moderation Metrics ==========

    /// Moderation actions by action type
    pub static ref MODERATION_ACTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "moderation_actions_total",
        "Total number of moderation actions",
        &["action_type", "target_type"]
    )
    .unwrap();

    // ========== Error Metrics ==========

    /// Errors by error type
    pub static ref ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "errors_total",
        "Total number of errors",
        &["error_type", "module"]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record a completed upload
pub fn record_upload(mime_type: &str) {
    UPLOADS_TOTAL.with_label_values(&[mime_type]).inc();
}

/// Record a rejected upload
pub fn record_upload_rejected(reason: &str) {
    UPLOADS_REJECTED_TOTAL.with_label_values(&[reason]).inc();
}

/// Record an account creation
pub fn record_account_creation(success: bool) {
    ACCOUNT_CREATIONS_TOTAL
        .with_label_values(&[if success { "success" } else { "failure" }])
        .inc();
}

/// Record a billing webhook event
pub fn record_webhook_event(event_type: &str, outcome: &str) {
    WEBHOOK_EVENTS_TOTAL
        .with_label_values(&[event_type, outcome])
        .inc();
}

/// Record a background job execution
pub fn record_background_job(job_type: &str, status: &str, duration: f64) {
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_type])
        .observe(duration);
}

/// Record a moderation action
pub fn record_moderation_action(action_type: &str, target_type: &str) {
    MODERATION_ACTIONS_TOTAL
        .with_label_values(&[action_type, target_type])
        .inc();
}

/// Record an error
pub fn record_error(error_type: &str, module: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type, module]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/images", 200, 0.05);
        let metrics = render_metrics();
        assert!(metrics.contains("http_requests_total"));
        assert!(metrics.contains("http_request_duration_seconds"));
    }

    #[test]
    fn test_record_upload_metrics() {
        record_upload("image/png");
        record_upload_rejected("quota");
        let metrics = render_metrics();
        assert!(metrics.contains("uploads_total"));
        assert!(metrics.contains("uploads_rejected_total"));
    }

    #[test]
    fn test_record_webhook_event() {
        record_webhook_event("invoice.payment_failed", "applied");
        let metrics = render_metrics();
        assert!(metrics.contains("webhook_events_total"));
    }

    #[test]
    fn test_record_background_job() {
        record_background_job("orphan_sweep", "success", 1.5);
        let metrics = render_metrics();
        assert!(metrics.contains("background_jobs_total"));
        assert!(metrics.contains("background_job_duration_seconds"));
    }

    #[test]
    fn test_metrics_rendering() {
        record_http_request("GET", "/health", 200, 0.01);
        let metrics = render_metrics();
        assert!(metrics.contains("# HELP"));
        assert!(metrics.contains("# TYPE"));
    }
}
