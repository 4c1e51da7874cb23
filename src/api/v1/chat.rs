//! Chat and legacy completion endpoint handlers

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderName, HeaderValue, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use tracing::{info, warn};

use crate::api::middleware::ClientContext;
use crate::api::state::AppState;
use crate::api::types::{
    ApiError, ChatCompletionRequest, ChatCompletionResponse, CompletionRequest,
    CompletionResponse, Json,
};
use crate::domain::{LlmRequest, RequestContext};
use crate::infrastructure::routing::{ProviderSelector, StreamOutcome};

pub const PROVIDER_HEADER: &str = "x-gateway-provider";
pub const COST_HEADER: &str = "x-gateway-cost";

/// POST /v1/chat/completions
pub async fn create_chat_completion(
    State(state): State<AppState>,
    ClientContext(ctx): ClientContext,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Response, ApiError> {
    complete(&state, &ctx, ProviderSelector::ByModel, request).await
}

/// POST /v1/providers/{provider}/chat/completions
pub async fn create_provider_chat_completion(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    ClientContext(ctx): ClientContext,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Response, ApiError> {
    complete(&state, &ctx, ProviderSelector::Explicit(provider), request).await
}

/// POST /v1/completions
pub async fn create_completion(
    State(state): State<AppState>,
    ClientContext(ctx): ClientContext,
    Json(request): Json<CompletionRequest>,
) -> Result<Response, ApiError> {
    complete_legacy(&state, &ctx, ProviderSelector::ByModel, request).await
}

/// POST /v1/providers/{provider}/completions
pub async fn create_provider_completion(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    ClientContext(ctx): ClientContext,
    Json(request): Json<CompletionRequest>,
) -> Result<Response, ApiError> {
    complete_legacy(&state, &ctx, ProviderSelector::Explicit(provider), request).await
}

async fn complete_legacy(
    state: &AppState,
    ctx: &RequestContext,
    selector: ProviderSelector,
    request: CompletionRequest,
) -> Result<Response, ApiError> {
    if request.stream {
        return Err(
            ApiError::bad_request("Streaming is not supported for legacy completions")
                .with_param("stream"),
        );
    }

    info!(
        request_id = %ctx.request_id(),
        model = %request.model,
        "Processing legacy completion request"
    );

    let outcome = state.gateway.chat(ctx, &selector, request.into()).await?;

    let mut response = Json(CompletionResponse::from(outcome.response)).into_response();
    set_header(&mut response, PROVIDER_HEADER, &outcome.provider);
    set_header(&mut response, COST_HEADER, &format_cost(outcome.cost));
    Ok(response)
}

async fn complete(
    state: &AppState,
    ctx: &RequestContext,
    selector: ProviderSelector,
    request: ChatCompletionRequest,
) -> Result<Response, ApiError> {
    info!(
        request_id = %ctx.request_id(),
        model = %request.model,
        stream = request.stream,
        "Processing chat completion request"
    );

    let request = LlmRequest::from(request);

    if request.stream {
        let outcome = state.gateway.chat_stream(ctx, &selector, request).await?;
        return Ok(stream_response(ctx.request_id(), outcome));
    }

    let outcome = state.gateway.chat(ctx, &selector, request).await?;

    let mut response = Json(ChatCompletionResponse::from(outcome.response)).into_response();
    set_header(&mut response, PROVIDER_HEADER, &outcome.provider);
    set_header(&mut response, COST_HEADER, &format_cost(outcome.cost));
    Ok(response)
}

/// Forward the provider's stream untouched
fn stream_response(request_id: &str, outcome: StreamOutcome) -> Response {
    let request_id = request_id.to_string();
    let provider = outcome.provider.clone();

    let stream = outcome.stream.inspect(move |chunk| {
        if let Err(e) = chunk {
            warn!(
                request_id = %request_id,
                provider = %provider,
                error = %e,
                "Upstream stream failed mid-response"
            );
        }
    });

    let mut response = Body::from_stream(stream).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(outcome.content_type),
    );
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    set_header(&mut response, PROVIDER_HEADER, &outcome.provider);
    response
}

pub(super) fn set_header(response: &mut Response, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(name), value);
    }
}

fn format_cost(cost: f64) -> String {
    format!("{cost:.6}")
}
