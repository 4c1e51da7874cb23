//! Canonical LLM types and the provider adapter contract

mod config;
mod context;
mod embedding;
mod message;
mod model;
mod provider;
mod request;
mod response;

pub use config::{DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECONDS, ProviderConfig, ProviderRateLimit};
pub use context::RequestContext;
pub use embedding::{Embedding, EmbeddingInput, EmbeddingRequest, EmbeddingResponse, EmbeddingUsage};
pub use message::{Message, MessageRole};
pub use model::{ModelInfo, Pricing};
pub use provider::{ByteStream, LlmProvider};
pub use request::{LlmRequest, LlmRequestBuilder};
pub use response::{Choice, FinishReason, LlmResponse, ResponseError, Usage};

#[cfg(test)]
pub use provider::mock::MockLlmProvider;
