//! OpenAI-compatible model, embedding and pricing types

use serde::{Deserialize, Serialize};

use crate::domain::{EmbeddingResponse, ModelInfo, Pricing};

/// Model information (OpenAI format, plus the limits the gateway knows)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub object: String,
    pub owned_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_size: Option<u32>,
}

impl From<ModelInfo> for Model {
    fn from(info: ModelInfo) -> Self {
        Self {
            id: info.id,
            object: "model".to_string(),
            owned_by: info.owned_by,
            max_tokens: info.max_tokens,
            context_size: info.context_size,
        }
    }
}

/// Generic `{"object": "list", "data": [...]}` envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub object: String,
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            object: "list".to_string(),
            data,
        }
    }
}

pub type ModelsResponse = ListResponse<Model>;

impl FromIterator<ModelInfo> for ModelsResponse {
    fn from_iter<I: IntoIterator<Item = ModelInfo>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Model::from).collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub id: String,
    pub object: String,
}

impl ProviderEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: "provider".to_string(),
        }
    }
}

pub type ProvidersResponse = ListResponse<ProviderEntry>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingResponse {
    pub provider: String,
    pub model: String,
    #[serde(flatten)]
    pub pricing: Pricing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingData {
    pub object: String,
    pub index: u32,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingUsageBody {
    pub prompt_tokens: u32,
    pub total_tokens: u32,
}

/// Embeddings response (OpenAI format)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsResponse {
    pub object: String,
    pub data: Vec<EmbeddingData>,
    pub model: String,
    pub usage: EmbeddingUsageBody,
}

impl From<EmbeddingResponse> for EmbeddingsResponse {
    fn from(response: EmbeddingResponse) -> Self {
        Self {
            object: "list".to_string(),
            data: response
                .data
                .into_iter()
                .map(|e| EmbeddingData {
                    object: "embedding".to_string(),
                    index: e.index,
                    embedding: e.embedding,
                })
                .collect(),
            model: response.model,
            usage: EmbeddingUsageBody {
                prompt_tokens: response.usage.prompt_tokens,
                total_tokens: response.usage.total_tokens,
            },
        }
    }
}
