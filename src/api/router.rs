use axum::{Router, middleware::from_fn, routing::get};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use super::health;
use super::middleware::{logging_middleware, metrics_middleware};
use super::state::AppState;
use super::v1;
use crate::infrastructure::observability::create_metrics_router;

/// Create the full router with application state
///
/// The Prometheus endpoint is mounted at `metrics_path` only when the state
/// carries an installed recorder.
pub fn create_router(state: AppState, metrics_path: &str) -> Router {
    let metrics = state.metrics.clone();

    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        .nest("/v1", v1::create_v1_router())
        .route_layer(from_fn(metrics_middleware))
        .with_state(state);

    if let Some(metrics) = metrics {
        router = router.merge(create_metrics_router(metrics, metrics_path));
    }

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(CorsLayer::permissive())
            .layer(from_fn(logging_middleware)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;
    use crate::domain::llm::MockLlmProvider;
    use crate::infrastructure::rate_limit::{RateLimiter, RateLimiterConfig};
    use crate::infrastructure::routing::{Gateway, ModelRoutes, ProviderRegistry, RetryPolicy};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn registry() -> Arc<ProviderRegistry> {
        let registry = Arc::new(ProviderRegistry::new());
        for name in ["openai", "anthropic"] {
            registry
                .register(name, Arc::new(MockLlmProvider::new(name)))
                .await
                .unwrap();
        }
        registry
    }

    async fn app() -> Router {
        let gateway = Gateway::new(registry().await, ModelRoutes::default(), RetryPolicy::default());
        create_router(AppState::new(Arc::new(gateway)), "/metrics")
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn chat_body(model: &str) -> Value {
        json!({"model": model, "messages": [{"role": "user", "content": "hi"}]})
    }

    #[tokio::test]
    async fn test_health_sets_request_id() {
        let response = app().await.oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let request = Request::builder()
            .uri("/live")
            .header("x-request-id", "req-abc")
            .body(Body::empty())
            .unwrap();
        let response = app().await.oneshot(request).await.unwrap();

        assert_eq!(response.headers().get("x-request-id").unwrap(), "req-abc");
    }

    #[tokio::test]
    async fn test_ready_requires_a_provider() {
        let response = app().await.oneshot(get("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["providers"], json!(["anthropic", "openai"]));

        let empty = Gateway::new(
            Arc::new(ProviderRegistry::new()),
            ModelRoutes::default(),
            RetryPolicy::default(),
        );
        let app = create_router(AppState::new(Arc::new(empty)), "/metrics");
        let response = app.oneshot(get("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_chat_completion() {
        let response = app()
            .await
            .oneshot(post_json("/v1/chat/completions", chat_body("gpt-4")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-gateway-provider").unwrap(), "openai");
        assert_eq!(response.headers().get("x-gateway-cost").unwrap(), "0.000020");

        let json = body_json(response).await;
        assert_eq!(json["object"], "chat.completion");
        assert_eq!(json["choices"][0]["message"]["role"], "assistant");
        assert_eq!(json["usage"]["total_tokens"], 15);
    }

    #[tokio::test]
    async fn test_explicit_provider_chat_completion() {
        let response = app()
            .await
            .oneshot(post_json(
                "/v1/providers/anthropic/chat/completions",
                chat_body("gpt-4"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-gateway-provider").unwrap(),
            "anthropic"
        );
    }

    #[tokio::test]
    async fn test_stream_is_passed_through() {
        let mut body = chat_body("claude-3-5-haiku-20241022");
        body["stream"] = json!(true);

        let response = app()
            .await
            .oneshot(post_json("/v1/chat/completions", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            bytes.as_ref(),
            b"data: {\"delta\":\"hi\"}\n\ndata: [DONE]\n\n".as_slice()
        );
    }

    #[tokio::test]
    async fn test_unroutable_model_is_not_found() {
        let response = app()
            .await
            .oneshot(post_json("/v1/chat/completions", chat_body("llama-3")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["type"], "not_found_error");
    }

    #[tokio::test]
    async fn test_invalid_bodies_are_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/v1/chat/completions")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app().await.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "json_parse_error");

        let response = app()
            .await
            .oneshot(post_json(
                "/v1/chat/completions",
                json!({"model": "gpt-4", "messages": []}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"]["type"],
            "invalid_request_error"
        );
    }

    #[tokio::test]
    async fn test_rate_limit_returns_429() {
        let limiter = Arc::new(RateLimiter::new(RateLimiterConfig {
            limit: 1,
            window: Duration::from_secs(1),
            ..Default::default()
        }));
        let gateway = Gateway::new(registry().await, ModelRoutes::default(), RetryPolicy::default())
            .with_rate_limiter(limiter);
        let app = create_router(AppState::new(Arc::new(gateway)), "/metrics");

        let first = app
            .clone()
            .oneshot(post_json("/v1/chat/completions", chat_body("gpt-4")))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(post_json("/v1/chat/completions", chat_body("gpt-4")))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers().get(header::RETRY_AFTER).unwrap(), "1");
        assert_eq!(body_json(second).await["error"]["type"], "rate_limit_error");
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let registry = Arc::new(ProviderRegistry::new());
        registry
            .register(
                "openai",
                Arc::new(
                    MockLlmProvider::new("openai")
                        .fail_with(DomainError::upstream("openai", 500, "boom")),
                ),
            )
            .await
            .unwrap();
        let gateway = Gateway::new(registry, ModelRoutes::default(), RetryPolicy::default());
        let app = create_router(AppState::new(Arc::new(gateway)), "/metrics");

        let response = app
            .oneshot(post_json("/v1/chat/completions", chat_body("gpt-4")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["error"]["code"], "upstream_500");
    }

    #[tokio::test]
    async fn test_legacy_completion() {
        let response = app()
            .await
            .oneshot(post_json(
                "/v1/completions",
                json!({"model": "gpt-3.5-turbo", "prompt": "Say hi"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["choices"][0]["text"], "Hello from mock");

        let response = app()
            .await
            .oneshot(post_json(
                "/v1/completions",
                json!({"model": "gpt-3.5-turbo", "prompt": "Say hi", "stream": true}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_provider_scoped_legacy_completion() {
        let response = app()
            .await
            .oneshot(post_json(
                "/v1/providers/anthropic/completions",
                json!({"model": "claude-3-5-haiku-20241022", "prompt": "Say hi"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-gateway-provider").unwrap(),
            "anthropic"
        );
        assert_eq!(body_json(response).await["object"], "text_completion");

        let response = app()
            .await
            .oneshot(post_json(
                "/v1/providers/mistral/completions",
                json!({"model": "mistral-large", "prompt": "Say hi"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"]["code"], "unknown_provider");
    }

    #[tokio::test]
    async fn test_provider_scoped_embeddings() {
        let registry = Arc::new(ProviderRegistry::new());
        registry
            .register("openai", Arc::new(MockLlmProvider::new("openai").with_embeddings()))
            .await
            .unwrap();
        registry
            .register("anthropic", Arc::new(MockLlmProvider::new("anthropic")))
            .await
            .unwrap();
        let gateway = Gateway::new(registry, ModelRoutes::default(), RetryPolicy::default());
        let app = create_router(AppState::new(Arc::new(gateway)), "/metrics");
        let body = json!({"model": "custom-embedder", "input": "hello"});

        let response = app
            .clone()
            .oneshot(post_json("/v1/providers/openai/embeddings", body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-gateway-provider").unwrap(), "openai");
        let json = body_json(response).await;
        assert_eq!(json["object"], "list");
        assert_eq!(json["model"], "custom-embedder");
        assert_eq!(json["data"][0]["embedding"], json!([0.5, 0.25]));

        let response = app
            .oneshot(post_json("/v1/providers/anthropic/embeddings", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"]["type"],
            "invalid_request_error"
        );
    }

    #[tokio::test]
    async fn test_models_endpoints() {
        let response = app().await.oneshot(get("/v1/models")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["object"], "list");
        assert_eq!(json["data"].as_array().unwrap().len(), 2);

        let response = app()
            .await
            .oneshot(get("/v1/models/anthropic/mock-model"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["owned_by"], "anthropic");

        let response = app()
            .await
            .oneshot(get("/v1/models/gpt-unknown"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_provider_endpoints() {
        let response = app().await.oneshot(get("/v1/providers")).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["data"][0]["id"], "anthropic");
        assert_eq!(json["data"][1]["id"], "openai");

        let response = app()
            .await
            .oneshot(get("/v1/providers/openai/models"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["data"][0]["owned_by"], "openai");

        let response = app()
            .await
            .oneshot(get("/v1/providers/openai/models/gpt-4/pricing"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["provider"], "openai");
        assert_eq!(json["output_cost_per_1k_tokens"], 0.002);

        let response = app()
            .await
            .oneshot(get("/v1/providers/mistral/models"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_route_absent_without_recorder() {
        let response = app().await.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
