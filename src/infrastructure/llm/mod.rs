//! LLM provider implementations

mod anthropic;
mod factory;
mod http_client;
mod openai;

pub use anthropic::{ANTHROPIC_PROVIDER, AnthropicProvider};
pub use factory::{LlmProviderFactory, LlmProviderKind};
pub use http_client::{Headers, HttpClient, HttpClientTrait};
pub use openai::{OPENAI_PROVIDER, OpenAiProvider};
