//! Model catalog endpoint handlers

use axum::extract::{Path, State};

use crate::api::middleware::ClientContext;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, Model, ModelsResponse};

/// GET /v1/models
///
/// Lists every registered provider's models; a provider that cannot be
/// reached is left out.
pub async fn list_models(
    State(state): State<AppState>,
    ClientContext(ctx): ClientContext,
) -> Result<Json<ModelsResponse>, ApiError> {
    let models = state.gateway.list_models(&ctx, None).await?;
    Ok(Json(models.into_iter().collect()))
}

/// GET /v1/models/{*model_id}
pub async fn get_model(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
    ClientContext(ctx): ClientContext,
) -> Result<Json<Model>, ApiError> {
    let info = state.gateway.model_info(&ctx, &model_id).await?;
    Ok(Json(info.into()))
}
