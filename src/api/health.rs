//! Health, liveness and readiness endpoints

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use super::state::AppState;
use crate::api::types::Json;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Returns 200 whenever the process is serving
pub async fn health_check() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        providers: None,
    };

    (StatusCode::OK, Json(response))
}

/// Ready once at least one provider is registered
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let providers = state.gateway.providers().await;
    let (status, code) = if providers.is_empty() {
        (HealthStatus::Unhealthy, StatusCode::SERVICE_UNAVAILABLE)
    } else {
        (HealthStatus::Healthy, StatusCode::OK)
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        providers: Some(providers),
    };

    (code, Json(response))
}

pub async fn live_check() -> impl IntoResponse {
    StatusCode::OK
}
