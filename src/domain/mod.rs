//! Domain layer - provider-agnostic types, traits and errors

pub mod error;
pub mod llm;

pub use error::DomainError;
pub use llm::{
    ByteStream, Choice, EmbeddingInput, EmbeddingRequest, EmbeddingResponse, FinishReason,
    LlmProvider, LlmRequest, LlmRequestBuilder, LlmResponse, Message, MessageRole, ModelInfo,
    Pricing, ProviderConfig, RequestContext, Usage,
};
