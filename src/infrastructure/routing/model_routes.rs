use std::collections::HashMap;

use crate::domain::DomainError;
use crate::infrastructure::llm::{ANTHROPIC_PROVIDER, OPENAI_PROVIDER};

const PREFIX_RULES: &[(&str, &str)] = &[
    ("gpt-", OPENAI_PROVIDER),
    ("o1", OPENAI_PROVIDER),
    ("o3", OPENAI_PROVIDER),
    ("o4", OPENAI_PROVIDER),
    ("text-embedding-", OPENAI_PROVIDER),
    ("chatgpt-", OPENAI_PROVIDER),
    ("claude-", ANTHROPIC_PROVIDER),
];

/// Where a model id should be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub provider: String,
    /// Model id to forward, with any `provider/` prefix removed
    pub model: String,
}

/// Model id to provider resolution
///
/// Checked in order: `provider/model` syntax, the configured table, built-in
/// prefix rules, then the default provider.
#[derive(Debug, Clone, Default)]
pub struct ModelRoutes {
    table: HashMap<String, String>,
    default_provider: Option<String>,
}

impl ModelRoutes {
    pub fn new(table: HashMap<String, String>, default_provider: Option<String>) -> Self {
        Self {
            table,
            default_provider: default_provider.filter(|p| !p.is_empty()),
        }
    }

    pub fn resolve(&self, model: &str, registered: &[String]) -> Result<Route, DomainError> {
        if let Some((provider, rest)) = model.split_once('/') {
            if !rest.is_empty() && registered.iter().any(|name| name == provider) {
                return Ok(Route {
                    provider: provider.to_string(),
                    model: rest.to_string(),
                });
            }
        }

        let route = |provider: &str| Route {
            provider: provider.to_string(),
            model: model.to_string(),
        };

        if let Some(provider) = self.table.get(model) {
            return Ok(route(provider.as_str()));
        }

        if let Some((_, provider)) = PREFIX_RULES
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix))
        {
            return Ok(route(*provider));
        }

        match &self.default_provider {
            Some(provider) => Ok(route(provider.as_str())),
            None => Err(DomainError::unknown_provider(format!(
                "no provider serves model {model}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered() -> Vec<String> {
        vec!["anthropic".to_string(), "openai".to_string()]
    }

    #[test]
    fn test_prefix_rules() {
        let routes = ModelRoutes::default();

        let route = routes.resolve("gpt-4", &registered()).unwrap();
        assert_eq!(route.provider, "openai");
        assert_eq!(route.model, "gpt-4");

        let route = routes.resolve("claude-3-5-sonnet-20241022", &registered()).unwrap();
        assert_eq!(route.provider, "anthropic");

        let route = routes.resolve("o3-mini", &registered()).unwrap();
        assert_eq!(route.provider, "openai");
    }

    #[test]
    fn test_explicit_provider_syntax_strips_prefix() {
        let routes = ModelRoutes::default();
        let route = routes.resolve("anthropic/my-custom-model", &registered()).unwrap();

        assert_eq!(
            route,
            Route {
                provider: "anthropic".to_string(),
                model: "my-custom-model".to_string(),
            }
        );
    }

    #[test]
    fn test_unregistered_prefix_is_part_of_model_id() {
        let routes = ModelRoutes::new(HashMap::new(), Some("openai".to_string()));
        let route = routes.resolve("ft:gpt/custom", &registered()).unwrap();

        assert_eq!(route.provider, "openai");
        assert_eq!(route.model, "ft:gpt/custom");
    }

    #[test]
    fn test_table_wins_over_prefix() {
        let table = HashMap::from([("gpt-4".to_string(), "anthropic".to_string())]);
        let routes = ModelRoutes::new(table, None);

        assert_eq!(routes.resolve("gpt-4", &registered()).unwrap().provider, "anthropic");
    }

    #[test]
    fn test_default_provider_and_unknown() {
        let routes = ModelRoutes::default();
        let err = routes.resolve("llama-3", &registered()).unwrap_err();
        assert!(matches!(err, DomainError::UnknownProvider { .. }));

        let routes = ModelRoutes::new(HashMap::new(), Some("anthropic".to_string()));
        assert_eq!(routes.resolve("llama-3", &registered()).unwrap().provider, "anthropic");
    }
}
