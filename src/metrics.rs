/// Metrics and telemetry for the Campus Report portal
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Login attempts by outcome
/// - Issue submissions and status transitions
/// - Access denials and admin actions

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "portal_http_requests_total",
        "Total number of HTTP requests",
        &["method", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "portal_http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .unwrap();

    // ========== Account Metrics ==========

    /// Login attempts by outcome
    pub static ref LOGIN_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "portal_login_attempts_total",
        "Total number of login attempts",
        &["outcome"]
    )
    .unwrap();

    /// Requests refused by the authorization guard
    pub static ref ACCESS_DENIED_TOTAL: IntCounter = register_int_counter!(
        "portal_access_denied_total",
        "Total number of requests denied for missing session or role"
    )
    .unwrap();

    // ========== Issue Metrics ==========

    /// Issues submitted by students
    pub static ref ISSUES_SUBMITTED_TOTAL: IntCounter = register_int_counter!(
        "portal_issues_submitted_total",
        "Total number of issues submitted"
    )
    .unwrap();

    /// Issue status transitions by target status
    pub static ref ISSUE_TRANSITIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "portal_issue_transitions_total",
        "Total number of issue status updates",
        &["status"]
    )
    .unwrap();

    // ========== Admin Metrics ==========

    /// Audited admin actions by action name
    pub static ref ADMIN_ACTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "portal_admin_actions_total",
        "Total number of audited admin actions",
        &["action"]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method])
        .observe(duration);
}

/// Record a login attempt
pub fn record_login(outcome: &str) {
    LOGIN_ATTEMPTS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a status update on an issue
pub fn record_issue_transition(status: &str) {
    ISSUE_TRANSITIONS_TOTAL.with_label_values(&[status]).inc();
}

/// Record an audited admin action
pub fn record_admin_action(action: &str) {
    ADMIN_ACTIONS_TOTAL.with_label_values(&[action]).inc();
}
