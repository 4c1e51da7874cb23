//! Provider registry, model routing and the gateway router

mod gateway;
mod model_routes;
mod registry;
mod retry;

pub use gateway::{
    CompletionOutcome, Gateway, ProviderSelector, STREAM_CONTENT_TYPE, StreamOutcome,
};
pub use model_routes::{ModelRoutes, Route};
pub use registry::ProviderRegistry;
pub use retry::RetryPolicy;
