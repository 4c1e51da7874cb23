//! OpenAI-compatible wire types

pub mod chat;
pub mod error;
pub mod json;
pub mod models;

pub use chat::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, CompletionRequest,
    CompletionResponse, MessageContent, StopSequence,
};
pub use error::{ApiError, ApiErrorDetail, ApiErrorResponse, ApiErrorType};
pub use json::Json;
pub use models::{
    EmbeddingsResponse, ListResponse, Model, ModelsResponse, PricingResponse, ProviderEntry,
    ProvidersResponse,
};
