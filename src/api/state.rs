//! Application state shared by every handler

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::infrastructure::observability::PrometheusMetrics;
use crate::infrastructure::routing::Gateway;

#[derive(Clone, Debug)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    /// Parent of every request's cancellation token; cancelled on shutdown
    pub shutdown: CancellationToken,
    /// Per-request deadline, `None` to disable
    pub request_timeout: Option<Duration>,
    pub metrics: Option<PrometheusMetrics>,
}

impl AppState {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            shutdown: CancellationToken::new(),
            request_timeout: None,
            metrics: None,
        }
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_metrics(mut self, metrics: Option<PrometheusMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}
