use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::http_client::HttpClientTrait;
use crate::domain::{
    ByteStream, Choice, DomainError, FinishReason, LlmProvider, LlmRequest, LlmResponse, Message,
    MessageRole, ModelInfo, Pricing, ProviderConfig, RequestContext, Usage,
};

pub const ANTHROPIC_PROVIDER: &str = "anthropic";
const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const CONTEXT_SIZE: u32 = 200_000;

const MODELS: [&str; 3] = [
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
    "claude-3-opus-20240229",
];

static ANTHROPIC_PRICING: Lazy<HashMap<&'static str, Pricing>> = Lazy::new(|| {
    HashMap::from([
        ("claude-3-5-sonnet-20241022", Pricing::usd(0.003, 0.015)),
        ("claude-3-5-haiku-20241022", Pricing::usd(0.0008, 0.004)),
        ("claude-3-opus-20240229", Pricing::usd(0.015, 0.075)),
    ])
});

fn default_pricing() -> Pricing {
    Pricing::usd(0.003, 0.015)
}

/// Anthropic API provider
///
/// Anthropic has no catalog endpoint, so the model list is static.
#[derive(Debug)]
pub struct AnthropicProvider<C: HttpClientTrait> {
    client: C,
    headers: Vec<(String, String)>,
    base_url: String,
    max_retries: u32,
}

impl<C: HttpClientTrait> AnthropicProvider<C> {
    pub fn new(client: C, config: ProviderConfig) -> Self {
        let base_url = config.base_url_or(DEFAULT_ANTHROPIC_BASE_URL);

        let mut headers = vec![
            ("x-api-key".to_string(), config.api_key.clone()),
            (
                "anthropic-version".to_string(),
                ANTHROPIC_VERSION.to_string(),
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

    fn messages_url(&self) -> String {
        format!("{}/messages", self.base_url)
    }

    fn build_request(
        &self,
        request: &LlmRequest,
        stream: bool,
    ) -> Result<serde_json::Value, DomainError> {
        let (system, messages) = split_system_messages(&request.messages);

        if messages.is_empty() {
            return Err(DomainError::invalid_request(
                "anthropic requires at least one user or assistant message",
            ));
        }

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });

        if stream {
            body["stream"] = serde_json::json!(true);
        }

        if !system.is_empty() {
            body["system"] = serde_json::json!(system);
        }

        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        if let Some(top_p) = request.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }

        if !request.stop.is_empty() {
            body["stop_sequences"] = serde_json::json!(request.stop);
        }

        Ok(body)
    }

    fn parse_response(
        &self,
        json: serde_json::Value,
        request: &LlmRequest,
    ) -> Result<LlmResponse, DomainError> {
        let response: AnthropicResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::decode(ANTHROPIC_PROVIDER, format!("Failed to parse response: {e}"))
        })?;

        let content = response
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        let mut choice = Choice::new(0, Message::assistant(content));
        if let Some(reason) = response.stop_reason.as_deref() {
            choice = choice.with_finish_reason(parse_stop_reason(reason));
        }

        let model = response.model.unwrap_or_else(|| request.model.clone());

        Ok(
            LlmResponse::new(response.id, chrono::Utc::now().timestamp(), model)
                .with_choice(choice)
                .with_usage(Usage::new(
                    response.usage.input_tokens,
                    response.usage.output_tokens,
                )),
        )
    }
}

#[async_trait]
impl<C: HttpClientTrait> LlmProvider for AnthropicProvider<C> {
    fn name(&self) -> &str {
        ANTHROPIC_PROVIDER
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

        let url = self.messages_url();
        let body = self.build_request(request, false)?;

        let response = ctx
            .run(ANTHROPIC_PROVIDER, async {
                self.client
                    .post_json(&url, &self.headers, &body)
                    .await
                    .map_err(|e| e.with_provider(ANTHROPIC_PROVIDER))
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

        let url = self.messages_url();
        let body = self.build_request(request, true)?;

        let stream = ctx
            .run(ANTHROPIC_PROVIDER, async {
                self.client
                    .post_json_stream(&url, &self.headers, &body)
                    .await
                    .map_err(|e| e.with_provider(ANTHROPIC_PROVIDER))
            })
            .await?;

        Ok(ctx.guard_stream(stream))
    }

    async fn get_models(&self, _ctx: &RequestContext) -> Result<Vec<ModelInfo>, DomainError> {
        Ok(MODELS
            .iter()
            .map(|id| {
                ModelInfo::new(*id, ANTHROPIC_PROVIDER).with_limits(DEFAULT_MAX_TOKENS, CONTEXT_SIZE)
            })
            .collect())
    }

    fn get_pricing(&self, model_id: &str) -> Pricing {
        ANTHROPIC_PRICING
            .get(model_id)
            .cloned()
            .unwrap_or_else(default_pricing)
    }

    fn is_known_model(&self, model_id: &str) -> bool {
        MODELS.contains(&model_id)
    }
}

/// Lift system messages into Anthropic's top-level `system` block list
fn split_system_messages(messages: &[Message]) -> (Vec<SystemBlock>, Vec<AnthropicMessage>) {
    let mut system = Vec::new();
    let mut rest = Vec::new();

    for message in messages {
        match message.role {
            MessageRole::System => system.push(SystemBlock {
                block_type: "text".to_string(),
                text: message.content.clone(),
            }),
            MessageRole::User | MessageRole::Assistant => rest.push(AnthropicMessage {
                role: message.role,
                content: message.content.clone(),
            }),
        }
    }

    (system, rest)
}

fn parse_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

// Anthropic API types

#[derive(Debug, Serialize, Deserialize)]
struct SystemBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: MessageRole,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
