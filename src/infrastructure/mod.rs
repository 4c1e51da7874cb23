//! Infrastructure layer - provider adapters, routing and runtime plumbing

pub mod llm;
pub mod logging;
pub mod observability;
pub mod rate_limit;
pub mod routing;
