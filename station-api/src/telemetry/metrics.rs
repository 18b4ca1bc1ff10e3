//! Prometheus Metrics Definitions
//!
//! Counters for authorization decisions, provisioning outcomes, HTTP traffic
//! and logbook cache activity. Exposed on `/metrics` for scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, CounterVec, Encoder, TextEncoder};
use station_storage::{CacheEvent, CacheObserver};

/// Global metrics instance, registered with the default registry on first use.
pub static METRICS: Lazy<Result<StationMetrics, prometheus::Error>> =
    Lazy::new(StationMetrics::new);

/// The registered metrics, or `None` if registration failed.
pub fn metrics() -> Option<&'static StationMetrics> {
    METRICS.as_ref().ok()
}

/// Container for all station metrics.
#[derive(Clone)]
pub struct StationMetrics {
    /// Authorization decisions - labels: path (password/api_key), outcome
    pub auth_decisions_total: CounterVec,

    /// Provisioning transactions - labels: outcome
    pub provisioning_total: CounterVec,

    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// Logbook cache events - labels: event
    pub cache_events_total: CounterVec,
}

impl StationMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            auth_decisions_total: register_counter_vec!(
                "station_auth_decisions_total",
                "Authorization decisions by credential path and outcome",
                &["path", "outcome"]
            )?,

            provisioning_total: register_counter_vec!(
                "station_provisioning_total",
                "Logbook provisioning transactions by outcome",
                &["outcome"]
            )?,

            http_requests_total: register_counter_vec!(
                "station_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )?,

            cache_events_total: register_counter_vec!(
                "station_logbook_cache_events_total",
                "Logbook cache lookups and fills",
                &["event"]
            )?,
        })
    }

    /// Record an authorization decision.
    pub fn record_auth_decision(&self, path: &str, outcome: &str) {
        self.auth_decisions_total
            .with_label_values(&[path, outcome])
            .inc();
    }

    /// Record a provisioning outcome.
    pub fn record_provisioning(&self, outcome: &str) {
        self.provisioning_total.with_label_values(&[outcome]).inc();
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, status_str.as_str()])
            .inc();
    }
}

/// Feeds cache events into `station_logbook_cache_events_total`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheMetricsObserver;

impl CacheObserver for CacheMetricsObserver {
    fn on_event(&self, event: CacheEvent) {
        if let Some(m) = metrics() {
            m.cache_events_total
                .with_label_values(&[event.as_str()])
                .inc();
        }
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    // Touch the lazy so the families exist even before any traffic.
    let _ = metrics();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                b"Failed to encode metrics".to_vec(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e))?;
        assert!(!metrics.auth_decisions_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_auth_decision() -> Result<(), String> {
        let metrics = metrics().ok_or("metrics unavailable")?;
        let before = metrics
            .auth_decisions_total
            .with_label_values(&["api_key", "secret_mismatch"])
            .get();
        metrics.record_auth_decision("api_key", "secret_mismatch");
        let after = metrics
            .auth_decisions_total
            .with_label_values(&["api_key", "secret_mismatch"])
            .get();
        assert!(after >= before + 1.0);
        Ok(())
    }

    #[test]
    fn test_cache_observer_counts_events() -> Result<(), String> {
        let metrics = metrics().ok_or("metrics unavailable")?;
        let before = metrics.cache_events_total.with_label_values(&["fill"]).get();
        CacheMetricsObserver.on_event(CacheEvent::Fill);
        let after = metrics.cache_events_total.with_label_values(&["fill"]).get();
        assert!(after >= before + 1.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_metrics_handler_renders_text() {
        if let Some(m) = metrics() {
            m.record_provisioning("committed");
        }
        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("station_provisioning_total"));
    }
}
