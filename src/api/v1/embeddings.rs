use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use tracing::info;

use super::chat::{PROVIDER_HEADER, set_header};
use crate::api::middleware::ClientContext;
use crate::api::state::AppState;
use crate::api::types::{ApiError, EmbeddingsResponse, Json};
use crate::domain::{EmbeddingRequest, RequestContext};
use crate::infrastructure::routing::ProviderSelector;

/// POST /v1/embeddings
pub async fn create_embeddings(
    State(state): State<AppState>,
    ClientContext(ctx): ClientContext,
    Json(request): Json<EmbeddingRequest>,
) -> Result<Response, ApiError> {
    embed(&state, &ctx, ProviderSelector::ByModel, request).await
}

/// POST /v1/providers/{provider}/embeddings
pub async fn create_provider_embeddings(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    ClientContext(ctx): ClientContext,
    Json(request): Json<EmbeddingRequest>,
) -> Result<Response, ApiError> {
    embed(&state, &ctx, ProviderSelector::Explicit(provider), request).await
}

async fn embed(
    state: &AppState,
    ctx: &RequestContext,
    selector: ProviderSelector,
    request: EmbeddingRequest,
) -> Result<Response, ApiError> {
    info!(
        request_id = %ctx.request_id(),
        model = %request.model,
        inputs = request.input.len(),
        "Processing embeddings request"
    );

    let (provider, embeddings) = state
        .gateway
        .embeddings(ctx, &selector, request)
        .await?;

    let mut response = Json(EmbeddingsResponse::from(embeddings)).into_response();
    set_header(&mut response, PROVIDER_HEADER, &provider);
    Ok(response)
}
