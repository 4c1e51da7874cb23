//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, extract::State, response::IntoResponse, routing::get};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::MetricsConfig;

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}

impl PrometheusMetrics {
    /// Get the metrics as a string for the /metrics endpoint
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Install the global Prometheus recorder
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("ai_gateway_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
            tracing::info!(path = %config.path, "Prometheus metrics initialized");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Create the metrics router
pub fn create_metrics_router<S>(metrics: PrometheusMetrics, path: &str) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Record an HTTP request metric
///
/// `route` must be the matched route template so label cardinality stays bounded.
pub fn record_http_request(method: &str, route: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", route.to_string()),
        ("status", status.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    if status >= 500 {
        counter!("http_server_errors_total", &labels).increment(1);
    }
}

/// Outcome label for one provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Error,
}

impl CallOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Parameters for provider call metrics
///
/// `model` must come from a bounded set; the gateway passes `other` for ids
/// the adapter does not know.
#[derive(Debug)]
pub struct ProviderCallMetricParams<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub operation: &'static str,
    pub duration: Duration,
    pub outcome: CallOutcome,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// Record one provider call, including retries
pub fn record_provider_call(params: ProviderCallMetricParams<'_>) {
    let labels = [
        ("provider", params.provider.to_string()),
        ("model", params.model.to_string()),
        ("operation", params.operation.to_string()),
        ("status", params.outcome.as_str().to_string()),
    ];

    counter!("provider_requests_total", &labels).increment(1);
    histogram!("provider_request_duration_seconds", &labels)
        .record(params.duration.as_secs_f64());

    if let Some(tokens) = params.input_tokens {
        counter!("provider_input_tokens_total", &labels).increment(tokens);
    }

    if let Some(tokens) = params.output_tokens {
        counter!("provider_output_tokens_total", &labels).increment(tokens);
    }
}

pub fn record_provider_retry(provider: &str, operation: &'static str) {
    counter!(
        "provider_retries_total",
        "provider" => provider.to_string(),
        "operation" => operation
    )
    .increment(1);
}

pub fn record_rate_limited() {
    counter!("rate_limit_rejections_total").increment(1);
}

pub fn record_rate_limit_visitors(tracked: usize) {
    gauge!("rate_limit_tracked_clients").set(tracked as f64);
}
