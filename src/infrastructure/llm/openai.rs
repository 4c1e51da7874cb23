use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::http_client::HttpClientTrait;
use crate::domain::llm::{EmbeddingUsage, ResponseError};
use crate::domain::{
    ByteStream, Choice, DomainError, EmbeddingRequest, EmbeddingResponse, FinishReason,
    LlmProvider, LlmRequest, LlmResponse, Message, MessageRole, ModelInfo, Pricing,
    ProviderConfig, RequestContext, Usage,
};

pub const OPENAI_PROVIDER: &str = "openai";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

static OPENAI_PRICING: Lazy<HashMap<&'static str, Pricing>> = Lazy::new(|| {
    HashMap::from([
        ("gpt-4", Pricing::usd(0.03, 0.06)),
        ("gpt-4-turbo", Pricing::usd(0.01, 0.03)),
        ("gpt-3.5-turbo", Pricing::usd(0.0005, 0.0015)),
        ("gpt-3.5-turbo-16k", Pricing::usd(0.003, 0.004)),
        ("text-davinci-003", Pricing::usd(0.02, 0.02)),
        ("text-curie-001", Pricing::usd(0.002, 0.002)),
        ("text-babbage-001", Pricing::usd(0.0005, 0.0005)),
        ("text-ada-001", Pricing::usd(0.0004, 0.0004)),
        ("dall-e-3", Pricing::usd(0.04, 0.08)),
        ("whisper-1", Pricing::usd(0.006, 0.006)),
    ])
});

// (max output tokens, context window); the catalog endpoint reports neither
static OPENAI_LIMITS: Lazy<HashMap<&'static str, (u32, u32)>> = Lazy::new(|| {
    HashMap::from([
        ("gpt-4", (8_192, 8_192)),
        ("gpt-4-turbo", (4_096, 128_000)),
        ("gpt-4o", (16_384, 128_000)),
        ("gpt-4o-mini", (16_384, 128_000)),
        ("gpt-3.5-turbo", (4_096, 16_385)),
        ("gpt-3.5-turbo-16k", (4_096, 16_385)),
    ])
});

fn default_pricing() -> Pricing {
    Pricing::usd(0.01, 0.03)
}

/// OpenAI API provider
#[derive(Debug)]
pub struct OpenAiProvider<C: HttpClientTrait> {
    client: C,
    headers: Vec<(String, String)>,
    base_url: String,
    max_retries: u32,
}

impl<C: HttpClientTrait> OpenAiProvider<C> {
    pub fn new(client: C, config: ProviderConfig) -> Self {
        let base_url = config.base_url_or(DEFAULT_OPENAI_BASE_URL);

        let mut headers = vec![
            (
                "Authorization".to_string(),
                format!("Bearer {}", config.api_key),
            ),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];
        headers.extend(config.extra_headers.into_iter());

        Self {
            client,
            headers,
            base_url,
            max_retries: config.max_retries,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `{base}/models/{id}` with the id percent-encoded as one path segment
    fn model_url(&self, model_id: &str) -> Result<String, DomainError> {
        let mut url = reqwest::Url::parse(&self.url("/models")).map_err(|e| {
            DomainError::configuration(format!("Invalid OpenAI base URL: {e}"))
        })?;
        url.path_segments_mut()
            .map_err(|_| DomainError::configuration("OpenAI base URL cannot carry a path"))?
            .push(model_id);

        Ok(url.into())
    }

    fn build_request(&self, request: &LlmRequest, stream: bool) -> serde_json::Value {
        let messages: Vec<OpenAiMessage> = request.messages.iter().map(OpenAiMessage::from).collect();

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "stream": stream,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        if let Some(top_p) = request.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }

        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }

        body
    }

    fn parse_response(
        &self,
        json: serde_json::Value,
        request: &LlmRequest,
    ) -> Result<LlmResponse, DomainError> {
        let response: OpenAiResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::decode(OPENAI_PROVIDER, format!("Failed to parse response: {e}"))
        })?;

        if response.choices.is_empty() {
            let message = match &response.error {
                Some(error) => format!("Provider reported {}: {}", error.error_type, error.message),
                None => "No choices in response".to_string(),
            };
            return Err(DomainError::decode(OPENAI_PROVIDER, message));
        }

        let created = response
            .created
            .unwrap_or_else(|| chrono::Utc::now().timestamp());
        let model = response.model.unwrap_or_else(|| request.model.clone());

        let mut llm_response = LlmResponse::new(response.id, created, model);

        for (position, choice) in response.choices.into_iter().enumerate() {
            let index = choice.index.unwrap_or(position as u32);
            let message = Message::new(
                choice.message.role.unwrap_or(MessageRole::Assistant),
                choice.message.content.unwrap_or_default(),
            );

            let mut canonical = Choice::new(index, message);
            if let Some(reason) = choice.finish_reason {
                canonical = canonical.with_finish_reason(parse_finish_reason(&reason));
            }
            llm_response = llm_response.with_choice(canonical);
        }

        if let Some(usage) = response.usage {
            llm_response =
                llm_response.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
        }

        if let Some(error) = response.error {
            llm_response = llm_response.with_error(error);
        }

        Ok(llm_response)
    }

    fn model_info(&self, id: String) -> ModelInfo {
        let info = ModelInfo::new(id, OPENAI_PROVIDER);
        match OPENAI_LIMITS.get(info.id.as_str()) {
            Some(&(max_tokens, context_size)) => info.with_limits(max_tokens, context_size),
            None => info,
        }
    }
}

#[async_trait]
impl<C: HttpClientTrait> LlmProvider for OpenAiProvider<C> {
    fn name(&self) -> &str {
        OPENAI_PROVIDER
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    async fn send_request(
        &self,
        ctx: &RequestContext,
        request: &LlmRequest,
    ) -> Result<LlmResponse, DomainError> {
        request.validate()?;

        let url = self.url("/chat/completions");
        let body = self.build_request(request, false);

        let response = ctx
            .run(OPENAI_PROVIDER, async {
                self.client
                    .post_json(&url, &self.headers, &body)
                    .await
                    .map_err(|e| e.with_provider(OPENAI_PROVIDER))
            })
            .await?;

        self.parse_response(response, request)
    }

    async fn send_stream_request(
        &self,
        ctx: &RequestContext,
        request: &LlmRequest,
    ) -> Result<ByteStream, DomainError> {
        request.validate()?;

        let url = self.url("/chat/completions");
        let body = self.build_request(request, true);

        let stream = ctx
            .run(OPENAI_PROVIDER, async {
                self.client
                    .post_json_stream(&url, &self.headers, &body)
                    .await
                    .map_err(|e| e.with_provider(OPENAI_PROVIDER))
            })
            .await?;

        Ok(ctx.guard_stream(stream))
    }

    async fn get_models(&self, ctx: &RequestContext) -> Result<Vec<ModelInfo>, DomainError> {
        let url = self.url("/models");

        let json = ctx
            .run(OPENAI_PROVIDER, async {
                self.client
                    .get_json(&url, &self.headers)
                    .await
                    .map_err(|e| e.with_provider(OPENAI_PROVIDER))
            })
            .await?;

        let catalog: OpenAiModelList = serde_json::from_value(json).map_err(|e| {
            DomainError::decode(OPENAI_PROVIDER, format!("Failed to parse model list: {e}"))
        })?;

        Ok(catalog
            .data
            .into_iter()
            .map(|model| self.model_info(model.id))
            .collect())
    }

    async fn get_model_info(
        &self,
        ctx: &RequestContext,
        model_id: &str,
    ) -> Result<ModelInfo, DomainError> {
        let url = self.model_url(model_id)?;

        let result = ctx
            .run(OPENAI_PROVIDER, async {
                self.client
                    .get_json(&url, &self.headers)
                    .await
                    .map_err(|e| e.with_provider(OPENAI_PROVIDER))
            })
            .await;

        let json = match result {
            Ok(json) => json,
            Err(DomainError::Upstream { status: 404, .. }) => {
                return Err(DomainError::model_not_found(OPENAI_PROVIDER, model_id));
            }
            Err(e) => return Err(e),
        };

        let model: OpenAiModel = serde_json::from_value(json).map_err(|e| {
            DomainError::decode(OPENAI_PROVIDER, format!("Failed to parse model: {e}"))
        })?;

        Ok(self.model_info(model.id))
    }

    fn get_pricing(&self, model_id: &str) -> Pricing {
        OPENAI_PRICING
            .get(model_id)
            .cloned()
            .unwrap_or_else(default_pricing)
    }

    fn is_known_model(&self, model_id: &str) -> bool {
        OPENAI_PRICING.contains_key(model_id) || OPENAI_LIMITS.contains_key(model_id)
    }

    async fn create_embeddings(
        &self,
        ctx: &RequestContext,
        request: &EmbeddingRequest,
    ) -> Result<EmbeddingResponse, DomainError> {
        request.validate()?;

        let url = self.url("/embeddings");
        let body = serde_json::to_value(request).map_err(|e| {
            DomainError::invalid_request(format!("Failed to encode embedding request: {e}"))
        })?;

        let json = ctx
            .run(OPENAI_PROVIDER, async {
                self.client
                    .post_json(&url, &self.headers, &body)
                    .await
                    .map_err(|e| e.with_provider(OPENAI_PROVIDER))
            })
            .await?;

        let response: OpenAiEmbeddingResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::decode(OPENAI_PROVIDER, format!("Failed to parse embeddings: {e}"))
        })?;

        Ok(EmbeddingResponse {
            model: response.model.unwrap_or_else(|| request.model.clone()),
            data: response.data,
            usage: response.usage,
        })
    }
}

fn parse_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

// OpenAI API types

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: MessageRole,
    content: String,
}

impl From<&Message> for OpenAiMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    id: String,
    created: Option<i64>,
    model: Option<String>,
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
    error: Option<ResponseError>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    index: Option<u32>,
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    role: Option<MessageRole>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiModelList {
    data: Vec<OpenAiModel>,
}

#[derive(Debug, Deserialize)]
struct OpenAiModel {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    model: Option<String>,
    data: Vec<crate::domain::llm::Embedding>,
    #[serde(default)]
    usage: EmbeddingUsage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::llm::http_client::mock::MockHttpClient;
    use bytes::Bytes;
    use futures::StreamExt;

    const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
    const MODELS_URL: &str = "https://api.openai.com/v1/models";

    fn chat_reply() -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "gpt-4",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Hello! How can I help you?"
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 10,
                "completion_tokens": 8,
                "total_tokens": 999
            }
        })
    }

    fn provider(client: MockHttpClient) -> OpenAiProvider<MockHttpClient> {
        OpenAiProvider::new(client, ProviderConfig::new("test-api-key"))
    }

    fn request() -> LlmRequest {
        LlmRequest::builder("gpt-4").user("hi").build()
    }

    #[tokio::test]
    async fn test_openai_chat() {
        let provider = provider(MockHttpClient::new().with_response(CHAT_URL, chat_reply()));
        let ctx = RequestContext::background();

        let response = provider.send_request(&ctx, &request()).await.unwrap();

        assert_eq!(response.id, "chatcmpl-123");
        assert_eq!(response.model, "gpt-4");
        assert_eq!(response.created, 1_700_000_000);
        assert_eq!(response.choices[0].message.role, MessageRole::Assistant);
        assert_eq!(response.content(), Some("Hello! How can I help you?"));
        assert_eq!(response.choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.usage.prompt_tokens, 10);
        assert_eq!(response.usage.completion_tokens, 8);
        // Total is recomputed, not copied from the provider.
        assert_eq!(response.usage.total_tokens, 18);
    }

    #[tokio::test]
    async fn test_request_wire_format() {
        let client = MockHttpClient::new().with_response(CHAT_URL, chat_reply());
        let provider = provider(client);
        let ctx = RequestContext::background();

        let request = LlmRequest::builder("gpt-4")
            .system("be brief")
            .user("hi")
            .max_tokens(50)
            .temperature(0.5)
            .stop(vec!["END".into()])
            .build();
        provider.send_request(&ctx, &request).await.unwrap();

        let recorded = provider.client.last_request().unwrap();
        assert_eq!(recorded.header("authorization"), Some("Bearer test-api-key"));

        let body = recorded.body.unwrap();
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["max_tokens"], 50);
        assert_eq!(body["stream"], false);
        assert_eq!(body["stop"][0], "END");
        assert!(body.get("top_p").is_none());
    }

    #[test]
    fn test_messages_round_trip_through_wire_format() {
        let provider = provider(MockHttpClient::new());
        let request = LlmRequest::builder("gpt-4")
            .system("sys")
            .user("question")
            .assistant("answer")
            .user("follow-up")
            .build();

        let body = provider.build_request(&request, false);
        let wire: Vec<OpenAiMessage> = serde_json::from_value(body["messages"].clone()).unwrap();
        let restored: Vec<Message> = wire
            .into_iter()
            .map(|m| Message::new(m.role, m.content))
            .collect();

        assert_eq!(restored, request.messages);
    }

    #[tokio::test]
    async fn test_upstream_error_labelled_with_provider() {
        let client = MockHttpClient::new().with_status(CHAT_URL, 401, "invalid api key");
        let provider = provider(client);
        let ctx = RequestContext::background();

        let err = provider.send_request(&ctx, &request()).await.unwrap_err();
        match err {
            DomainError::Upstream {
                provider,
                status,
                body,
            } => {
                assert_eq!(provider, "openai");
                assert_eq!(status, 401);
                assert_eq!(body, "invalid api key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_reply_is_decode_error() {
        let client = MockHttpClient::new()
            .with_response(CHAT_URL, serde_json::json!({"id": "x", "choices": []}));
        let provider = provider(client);
        let ctx = RequestContext::background();

        let err = provider.send_request(&ctx, &request()).await.unwrap_err();
        assert!(matches!(err, DomainError::Decode { ref provider, .. } if provider == "openai"));
    }

    #[tokio::test]
    async fn test_error_only_reply_is_not_swallowed() {
        let client = MockHttpClient::new().with_response(
            CHAT_URL,
            serde_json::json!({
                "id": "x",
                "choices": [],
                "error": {"message": "context_length_exceeded", "type": "invalid_request_error"}
            }),
        );
        let provider = provider(client);
        let ctx = RequestContext::background();

        let err = provider.send_request(&ctx, &request()).await.unwrap_err();
        match err {
            DomainError::Decode { provider, message } => {
                assert_eq!(provider, "openai");
                assert!(message.contains("context_length_exceeded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_upstream() {
        let provider = provider(MockHttpClient::new());
        let ctx = RequestContext::background();
        let empty = LlmRequest::new("gpt-4", vec![]);

        let err = provider.send_request(&ctx, &empty).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidRequest { .. }));
        assert!(provider.client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_custom_base_url_and_extra_headers() {
        let custom_url = "http://localhost:8080/v1/chat/completions";
        let client = MockHttpClient::new().with_response(custom_url, chat_reply());
        let config = ProviderConfig::new("test-key")
            .with_base_url("http://localhost:8080/v1/")
            .with_header("OpenAI-Organization", "org-1")
            .with_header("Authorization", "Bearer override");
        let provider = OpenAiProvider::new(client, config);
        let ctx = RequestContext::background();

        provider.send_request(&ctx, &request()).await.unwrap();

        let recorded = provider.client.last_request().unwrap();
        assert_eq!(recorded.url, custom_url);
        assert_eq!(recorded.header("openai-organization"), Some("org-1"));
        assert_eq!(recorded.header("authorization"), Some("Bearer override"));
    }

    #[tokio::test]
    async fn test_stream_passes_raw_frames_through() {
        let client = MockHttpClient::new().with_stream_response(
            CHAT_URL,
            vec![
                Bytes::from_static(b"data: {\"choices\":[]}\n\n"),
                Bytes::from_static(b"data: [DONE]\n\n"),
            ],
        );
        let provider = provider(client);
        let ctx = RequestContext::background();

        let stream = provider.send_stream_request(&ctx, &request()).await.unwrap();
        let chunks: Vec<_> = stream.collect().await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].as_ref().unwrap(), &Bytes::from_static(b"data: [DONE]\n\n"));

        let body = provider.client.last_request().unwrap().body.unwrap();
        assert_eq!(body["stream"], true);
    }

    #[tokio::test]
    async fn test_get_models_enriches_limits() {
        let client = MockHttpClient::new().with_response(
            MODELS_URL,
            serde_json::json!({
                "object": "list",
                "data": [
                    {"id": "gpt-4", "object": "model", "owned_by": "openai"},
                    {"id": "ft:custom", "object": "model", "owned_by": "user-abc"}
                ]
            }),
        );
        let provider = provider(client);
        let ctx = RequestContext::background();

        let models = provider.get_models(&ctx).await.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].context_size, Some(8_192));
        assert_eq!(models[1].owned_by, "openai");
        assert!(models[1].max_tokens.is_none());
    }

    #[tokio::test]
    async fn test_get_model_info_not_found() {
        let client = MockHttpClient::new().with_status(
            format!("{MODELS_URL}/gpt-missing"),
            404,
            "{\"error\":{\"message\":\"not found\"}}",
        );
        let provider = provider(client);
        let ctx = RequestContext::background();

        let err = provider.get_model_info(&ctx, "gpt-missing").await.unwrap_err();
        assert!(matches!(err, DomainError::ModelNotFound { .. }));
    }

    #[tokio::test]
    async fn test_model_id_is_escaped_in_path() {
        let client = MockHttpClient::new().with_response(
            format!("{MODELS_URL}/ft:gpt-4%3Fx=1%23frag%2Fmore"),
            serde_json::json!({"id": "ft:gpt-4?x=1#frag/more", "object": "model"}),
        );
        let provider = provider(client);
        let ctx = RequestContext::background();

        let info = provider
            .get_model_info(&ctx, "ft:gpt-4?x=1#frag/more")
            .await
            .unwrap();

        assert_eq!(info.id, "ft:gpt-4?x=1#frag/more");
        let recorded = provider.client.last_request().unwrap();
        assert!(!recorded.url.contains('?'));
        assert!(!recorded.url.contains('#'));
    }

    #[test]
    fn test_pricing_table_and_default() {
        let provider = provider(MockHttpClient::new());

        let gpt4 = provider.get_pricing("gpt-4");
        assert_eq!(gpt4.input_cost_per_1k_tokens, 0.03);
        assert_eq!(gpt4.output_cost_per_1k_tokens, 0.06);

        let unknown = provider.get_pricing("gpt-unreleased");
        assert_eq!(unknown, Pricing::usd(0.01, 0.03));
        assert_eq!(unknown.currency, "usd");

        assert!(provider.is_known_model("gpt-4o"));
        assert!(provider.is_known_model("whisper-1"));
        assert!(!provider.is_known_model("gpt-unreleased"));
    }

    #[tokio::test]
    async fn test_embeddings() {
        let client = MockHttpClient::new().with_response(
            "https://api.openai.com/v1/embeddings",
            serde_json::json!({
                "object": "list",
                "model": "text-embedding-3-small",
                "data": [{"object": "embedding", "index": 0, "embedding": [0.1, 0.2]}],
                "usage": {"prompt_tokens": 2, "total_tokens": 2}
            }),
        );
        let provider = provider(client);
        let ctx = RequestContext::background();

        let response = provider
            .create_embeddings(&ctx, &EmbeddingRequest::single("text-embedding-3-small", "hi"))
            .await
            .unwrap();

        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].embedding, vec![0.1, 0.2]);
        assert_eq!(response.usage.total_tokens, 2);
    }
}
