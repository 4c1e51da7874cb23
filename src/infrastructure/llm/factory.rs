use std::str::FromStr;
use std::sync::Arc;

use super::http_client::HttpClient;
use super::{ANTHROPIC_PROVIDER, AnthropicProvider, OPENAI_PROVIDER, OpenAiProvider};
use crate::domain::{DomainError, LlmProvider, ProviderConfig};

/// Upstream services the gateway knows how to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProviderKind {
    OpenAi,
    Anthropic,
}

impl LlmProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => OPENAI_PROVIDER,
            Self::Anthropic => ANTHROPIC_PROVIDER,
        }
    }
}

impl FromStr for LlmProviderKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            OPENAI_PROVIDER => Ok(Self::OpenAi),
            ANTHROPIC_PROVIDER => Ok(Self::Anthropic),
            other => Err(DomainError::unknown_provider(other)),
        }
    }
}

/// Factory for creating LLM providers
#[derive(Debug)]
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create a provider backed by a reqwest client honouring the configured timeout
    pub fn create(
        kind: LlmProviderKind,
        config: ProviderConfig,
    ) -> Result<Arc<dyn LlmProvider>, DomainError> {
        if !config.has_api_key() {
            return Err(DomainError::configuration(format!(
                "No API key configured for provider {}",
                kind.as_str()
            )));
        }

        let http_client = HttpClient::with_timeout(config.timeout())?;

        match kind {
            LlmProviderKind::OpenAi => Ok(Arc::new(OpenAiProvider::new(http_client, config))),
            LlmProviderKind::Anthropic => {
                Ok(Arc::new(AnthropicProvider::new(http_client, config)))
            }
        }
    }

    /// Create an OpenAI provider directly
    pub fn create_openai(config: ProviderConfig) -> Result<Arc<dyn LlmProvider>, DomainError> {
        Self::create(LlmProviderKind::OpenAi, config)
    }

    /// Create an Anthropic provider directly
    pub fn create_anthropic(config: ProviderConfig) -> Result<Arc<dyn LlmProvider>, DomainError> {
        Self::create(LlmProviderKind::Anthropic, config)
    }
}
