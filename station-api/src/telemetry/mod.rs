//! Station Telemetry - Observability Infrastructure
//!
//! Structured logging via `tracing` and Prometheus counters for the API layer.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics, metrics_handler, CacheMetricsObserver, StationMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracer, LogFormat, TelemetryConfig};
