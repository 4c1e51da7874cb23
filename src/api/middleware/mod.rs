//! API middleware components

pub mod client;
pub mod logging;
pub mod metrics;

pub use client::{ClientContext, client_key};
pub use logging::{logging_middleware, redact_headers};
pub use metrics::metrics_middleware;
