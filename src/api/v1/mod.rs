//! OpenAI-compatible v1 API endpoints

pub mod chat;
pub mod embeddings;
pub mod models;
pub mod providers;

use axum::{
    Router,
    routing::{get, post},
};

use super::state::AppState;

/// Create v1 API router
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/chat/completions", post(chat::create_chat_completion))
        .route("/completions", post(chat::create_completion))
        .route("/embeddings", post(embeddings::create_embeddings))
        .route("/models", get(models::list_models))
        .route("/models/{*model_id}", get(models::get_model))
        .route("/providers", get(providers::list_providers))
        .route(
            "/providers/{provider}/models",
            get(providers::list_provider_models),
        )
        .route(
            "/providers/{provider}/models/{model_id}/pricing",
            get(providers::get_pricing),
        )
        .route(
            "/providers/{provider}/chat/completions",
            post(chat::create_provider_chat_completion),
        )
        .route(
            "/providers/{provider}/completions",
            post(chat::create_provider_completion),
        )
        .route(
            "/providers/{provider}/embeddings",
            post(embeddings::create_provider_embeddings),
        )
}
