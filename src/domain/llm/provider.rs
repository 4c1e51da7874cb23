use std::fmt::Debug;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use super::{
    EmbeddingRequest, EmbeddingResponse, LlmRequest, LlmResponse, ModelInfo, Pricing,
    RequestContext,
};
use crate::domain::DomainError;

/// Raw provider-framed response body
///
/// Dropping the stream closes the underlying connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, DomainError>> + Send>>;

/// Trait for upstream AI providers (OpenAI, Anthropic, etc.)
///
/// Implementations perform exactly one attempt per call; retries are decided
/// by the gateway.
#[async_trait]
pub trait LlmProvider: Send + Sync + Debug {
    /// Registry key and provenance label
    fn name(&self) -> &str;

    /// Upper bound on retries the gateway may spend on idempotent reads
    fn max_retries(&self) -> u32;

    /// Send a chat completion request
    async fn send_request(
        &self,
        ctx: &RequestContext,
        request: &LlmRequest,
    ) -> Result<LlmResponse, DomainError>;

    /// Send a streaming request and hand back the raw upstream body
    async fn send_stream_request(
        &self,
        ctx: &RequestContext,
        request: &LlmRequest,
    ) -> Result<ByteStream, DomainError>;

    /// List the models this provider serves
    async fn get_models(&self, ctx: &RequestContext) -> Result<Vec<ModelInfo>, DomainError>;

    async fn get_model_info(
        &self,
        ctx: &RequestContext,
        model_id: &str,
    ) -> Result<ModelInfo, DomainError> {
        self.get_models(ctx)
            .await?
            .into_iter()
            .find(|model| model.id == model_id)
            .ok_or_else(|| DomainError::model_not_found(self.name(), model_id))
    }

    async fn validate_model(&self, ctx: &RequestContext, model_id: &str) -> Result<(), DomainError> {
        self.get_model_info(ctx, model_id).await.map(|_| ())
    }

    /// Pricing for `model_id`; unknown models get the provider default
    fn get_pricing(&self, model_id: &str) -> Pricing;

    /// Whether `model_id` appears in this adapter's static tables
    ///
    /// Only known ids are used as metric labels.
    fn is_known_model(&self, _model_id: &str) -> bool {
        false
    }

    async fn create_embeddings(
        &self,
        _ctx: &RequestContext,
        _request: &EmbeddingRequest,
    ) -> Result<EmbeddingResponse, DomainError> {
        Err(DomainError::invalid_request(format!(
            "provider {} does not support embeddings",
            self.name()
        )))
    }
}
