use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::ProviderConfig;
use crate::infrastructure::rate_limit::RateLimiterConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    pub rate_limit: RateLimitSettings,
    pub retry: RetrySettings,
    pub routing: RoutingConfig,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Gateway-level deadline applied to every upstream call
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub requests_per_window: u32,
    pub window_ms: u64,
    pub sweep_interval_secs: u64,
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Also retry completions and stream establishment
    pub retry_completions: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub default_provider: Option<String>,
    /// Explicit model id to provider name table
    pub models: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: ProviderConfig,
    pub anthropic: ProviderConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 120,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_window: 100,
            window_ms: 1000,
            sweep_interval_secs: 60,
            idle_timeout_secs: 300,
        }
    }
}

impl RateLimitSettings {
    pub fn limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            limit: self.requests_per_window,
            window: Duration::from_millis(self.window_ms),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 200,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
            retry_completions: false,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app_config: AppConfig = config.try_deserialize()?;
        app_config.apply_key_fallbacks(|name| std::env::var(name).ok());
        Ok(app_config)
    }

    /// Fill missing provider keys from the vendors' conventional variables
    pub fn apply_key_fallbacks(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let providers = [
            (&mut self.providers.openai, "OPENAI_API_KEY"),
            (&mut self.providers.anthropic, "ANTHROPIC_API_KEY"),
        ];

        for (provider, variable) in providers {
            if !provider.has_api_key() {
                if let Some(key) = lookup(variable) {
                    provider.api_key = key;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.requests_per_window, 100);
        assert_eq!(config.providers.openai.timeout_seconds, 30);
        assert!(!config.retry.retry_completions);
    }

    #[test]
    fn test_limiter_config_conversion() {
        let limiter = RateLimitSettings::default().limiter_config();
        assert_eq!(limiter.limit, 100);
        assert_eq!(limiter.window, Duration::from_secs(1));
        assert_eq!(limiter.sweep_interval, Duration::from_secs(60));
        assert_eq!(limiter.idle_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_key_fallbacks_only_fill_missing_keys() {
        let mut config = AppConfig::default();
        config.providers.anthropic.api_key = "from-config".to_string();

        config.apply_key_fallbacks(|name| Some(format!("env-{name}")));

        assert_eq!(config.providers.openai.api_key, "env-OPENAI_API_KEY");
        assert_eq!(config.providers.anthropic.api_key, "from-config");
    }

    #[test]
    fn test_partial_sections_deserialize() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "rate_limit": {"requests_per_window": 3},
            "routing": {"default_provider": "openai", "models": {"my-model": "anthropic"}},
            "providers": {"openai": {"api_key": "sk", "max_retries": 1}}
        }))
        .unwrap();

        assert_eq!(config.rate_limit.requests_per_window, 3);
        assert_eq!(config.rate_limit.window_ms, 1000);
        assert_eq!(config.routing.models["my-model"], "anthropic");
        assert_eq!(config.providers.openai.max_retries, 1);
        assert!(!config.providers.anthropic.has_api_key());
    }

    #[test]
    fn test_request_timeout_disabled_at_zero() {
        let server = ServerConfig {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert!(server.request_timeout().is_none());
    }
}
