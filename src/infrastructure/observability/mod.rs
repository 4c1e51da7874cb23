//! Observability infrastructure - Prometheus metrics

pub mod metrics;

pub use self::metrics::{
    CallOutcome, PrometheusMetrics, ProviderCallMetricParams, create_metrics_router, init_metrics,
    record_http_request, record_provider_call, record_provider_retry, record_rate_limit_visitors,
    record_rate_limited,
};
