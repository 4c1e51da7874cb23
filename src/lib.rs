//! AI Aggregator Gateway
//!
//! One OpenAI-compatible HTTP front for several upstream AI providers:
//! - Provider adapters (OpenAI, Anthropic) behind a single canonical contract
//! - Model-based or explicit provider routing with retry policy
//! - Fixed-window per-client rate limiting

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use config::ProvidersConfig;
use infrastructure::llm::{LlmProviderFactory, LlmProviderKind};
use infrastructure::rate_limit::RateLimiter;
use infrastructure::routing::{Gateway, ModelRoutes, ProviderRegistry, RetryPolicy};
use tracing::{info, warn};

/// Create the application state from configuration
///
/// Providers without an API key are skipped with a warning; the gateway still
/// starts so `/ready` can report the gap.
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let registry = Arc::new(ProviderRegistry::new());
    register_providers(&registry, &config.providers).await?;

    let routes = ModelRoutes::new(
        config.routing.models.clone(),
        config.routing.default_provider.clone(),
    );
    let mut gateway = Gateway::new(registry, routes, RetryPolicy::from(&config.retry));

    if config.rate_limit.enabled {
        let limiter_config = config.rate_limit.limiter_config();
        info!(
            limit = limiter_config.limit,
            window_ms = limiter_config.window.as_millis() as u64,
            "Rate limiting enabled"
        );
        gateway = gateway.with_rate_limiter(Arc::new(RateLimiter::new(limiter_config)));
    } else {
        warn!("Rate limiting disabled");
    }

    Ok(AppState::new(Arc::new(gateway)).with_request_timeout(config.server.request_timeout()))
}

async fn register_providers(
    registry: &ProviderRegistry,
    providers: &ProvidersConfig,
) -> anyhow::Result<()> {
    let configured = [
        (LlmProviderKind::OpenAi, &providers.openai),
        (LlmProviderKind::Anthropic, &providers.anthropic),
    ];

    for (kind, provider_config) in configured {
        if !provider_config.has_api_key() {
            warn!(provider = kind.as_str(), "No API key configured, provider disabled");
            continue;
        }

        let provider = LlmProviderFactory::create(kind, provider_config.clone())?;
        registry.register(kind.as_str(), provider).await?;
    }

    if registry.is_empty().await {
        warn!("No providers registered; every completion request will fail");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProviderConfig;

    #[tokio::test]
    async fn test_providers_without_keys_are_skipped() {
        let mut config = AppConfig::default();
        config.providers.anthropic = ProviderConfig::new("sk-ant-test");

        let state = create_app_state_with_config(&config).await.unwrap();

        assert_eq!(state.gateway.providers().await, vec!["anthropic"]);
        assert!(state.gateway.rate_limiter().is_some());
        assert_eq!(state.request_timeout, config.server.request_timeout());
    }

    #[tokio::test]
    async fn test_rate_limiter_can_be_disabled() {
        let mut config = AppConfig::default();
        config.rate_limit.enabled = false;

        let state = create_app_state_with_config(&config).await.unwrap();

        assert!(state.gateway.rate_limiter().is_none());
        assert!(state.gateway.providers().await.is_empty());
    }
}
