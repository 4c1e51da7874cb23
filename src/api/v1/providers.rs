//! Provider-scoped endpoint handlers

use axum::extract::{Path, State};

use crate::api::middleware::ClientContext;
use crate::api::state::AppState;
use crate::api::types::{
    ApiError, Json, ModelsResponse, PricingResponse, ProviderEntry, ProvidersResponse,
};

/// GET /v1/providers
pub async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    let providers = state
        .gateway
        .providers()
        .await
        .into_iter()
        .map(ProviderEntry::new)
        .collect();

    Json(ProvidersResponse::new(providers))
}

/// GET /v1/providers/{provider}/models
pub async fn list_provider_models(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    ClientContext(ctx): ClientContext,
) -> Result<Json<ModelsResponse>, ApiError> {
    let models = state.gateway.list_models(&ctx, Some(&provider)).await?;
    Ok(Json(models.into_iter().collect()))
}

/// GET /v1/providers/{provider}/models/{model_id}/pricing
pub async fn get_pricing(
    State(state): State<AppState>,
    Path((provider, model)): Path<(String, String)>,
    ClientContext(ctx): ClientContext,
) -> Result<Json<PricingResponse>, ApiError> {
    let pricing = state.gateway.pricing(&ctx, &provider, &model).await?;

    Ok(Json(PricingResponse {
        provider,
        model,
        pricing,
    }))
}
