use serde::{Deserialize, Serialize};

use super::Usage;

/// Catalog entry for a model a provider serves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub owned_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_size: Option<u32>,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, owned_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owned_by: owned_by.into(),
            max_tokens: None,
            context_size: None,
        }
    }

    pub fn with_limits(mut self, max_tokens: u32, context_size: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self.context_size = Some(context_size);
        self
    }
}

/// Per-model token pricing, expressed per thousand tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input_cost_per_1k_tokens: f64,
    pub output_cost_per_1k_tokens: f64,
    pub currency: String,
}

impl Pricing {
    pub fn usd(input_cost_per_1k_tokens: f64, output_cost_per_1k_tokens: f64) -> Self {
        Self {
            input_cost_per_1k_tokens,
            output_cost_per_1k_tokens,
            currency: "usd".to_string(),
        }
    }

    /// Cost of a completed request
    pub fn cost_for(&self, usage: &Usage) -> f64 {
        let input = f64::from(usage.prompt_tokens) / 1000.0 * self.input_cost_per_1k_tokens;
        let output = f64::from(usage.completion_tokens) / 1000.0 * self.output_cost_per_1k_tokens;
        input + output
    }
}
