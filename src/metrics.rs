//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("firm_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "firm_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "endpoint"]
    ).expect("metric can be created");

    // Dispatch engine metrics
    pub static ref ACTIVITIES_RECEIVED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("firm_activities_received_total", "Total number of inbox activities processed"),
        &["activity_type"]
    ).expect("metric can be created");
    pub static ref ACTIVITIES_PUBLISHED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("firm_activities_published_total", "Total number of outbox activities published"),
        &["activity_type"]
    ).expect("metric can be created");

    // Authentication / authorization metrics
    pub static ref AUTH_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("firm_auth_attempts_total", "Authentication attempts by scheme and outcome"),
        &["scheme", "outcome"]
    ).expect("metric can be created");
    pub static ref AUTHZ_DECISIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("firm_authz_decisions_total", "Authorization decisions by kind and outcome"),
        &["kind", "outcome"]
    ).expect("metric can be created");

    // Store metrics
    pub static ref STORE_FETCH_FALLBACK_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("firm_store_fetch_fallback_total", "Remote fetch-fallback attempts"),
        &["outcome"]
    ).expect("metric can be created");

    // Federation delivery metrics
    pub static ref DELIVERY_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("firm_delivery_attempts_total", "Outbound delivery attempts"),
        &["outcome"]
    ).expect("metric can be created");

    // Error metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("firm_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("HTTP_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("HTTP_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(ACTIVITIES_RECEIVED_TOTAL.clone()))
        .expect("ACTIVITIES_RECEIVED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ACTIVITIES_PUBLISHED_TOTAL.clone()))
        .expect("ACTIVITIES_PUBLISHED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(AUTH_ATTEMPTS_TOTAL.clone()))
        .expect("AUTH_ATTEMPTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(AUTHZ_DECISIONS_TOTAL.clone()))
        .expect("AUTHZ_DECISIONS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(STORE_FETCH_FALLBACK_TOTAL.clone()))
        .expect("STORE_FETCH_FALLBACK_TOTAL can be registered");
    REGISTRY
        .register(Box::new(DELIVERY_ATTEMPTS_TOTAL.clone()))
        .expect("DELIVERY_ATTEMPTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

/// Render the registry in Prometheus text exposition format.
pub fn render() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("metrics encode to valid utf8");
    String::from_utf8(buffer).expect("prometheus text encoder emits valid utf8")
}
