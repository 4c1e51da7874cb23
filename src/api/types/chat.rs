//! OpenAI-compatible chat and legacy completion types

use serde::{Deserialize, Serialize};

use crate::domain::llm::ResponseError;
use crate::domain::{FinishReason, LlmRequest, LlmResponse, Message, MessageRole, Usage};

/// Content part for array-form message content; only text parts are kept
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    #[serde(other)]
    Unsupported,
}

/// Message content - plain text or an array of parts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Text content, joining text parts with newlines
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Unsupported => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A chat message in OpenAI format
///
/// `role` uses the closed domain enum, so an unknown role fails to decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&ChatMessage> for Message {
    fn from(message: &ChatMessage) -> Self {
        Message::new(message.role, message.content.to_text())
    }
}

/// Stop sequence - can be string or array
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequence {
    Single(String),
    Multiple(Vec<String>),
}

impl StopSequence {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::Single(s) => vec![s],
            Self::Multiple(v) => v,
        }
    }
}

/// Chat completion request (OpenAI format)
///
/// Fields the gateway does not forward (`n`, `user`, penalties, ...) are
/// accepted and ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl From<ChatCompletionRequest> for LlmRequest {
    fn from(request: ChatCompletionRequest) -> Self {
        let messages = request.messages.iter().map(Message::from).collect();
        let mut builder = LlmRequest::builder(request.model)
            .messages(messages)
            .stream(request.stream);

        if let Some(temperature) = request.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(top_p) = request.top_p {
            builder = builder.top_p(top_p);
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        if let Some(stop) = request.stop {
            builder = builder.stop(stop.into_vec());
        }

        builder.build()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChoice {
    pub index: u32,
    pub message: Message,
    pub finish_reason: Option<FinishReason>,
}

/// Chat completion response (OpenAI format)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
    pub usage: Usage,
    /// Partial failure reported alongside the choices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl From<LlmResponse> for ChatCompletionResponse {
    fn from(response: LlmResponse) -> Self {
        Self {
            id: response.id,
            object: "chat.completion".to_string(),
            created: response.created,
            model: response.model,
            choices: response
                .choices
                .into_iter()
                .map(|c| ChatCompletionChoice {
                    index: c.index,
                    message: c.message,
                    finish_reason: c.finish_reason,
                })
                .collect(),
            usage: response.usage,
            error: response.error,
        }
    }
}

/// Legacy prompt input
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptInput {
    Single(String),
    Multiple(Vec<String>),
}

impl PromptInput {
    fn into_text(self) -> String {
        match self {
            Self::Single(s) => s,
            Self::Multiple(v) => v.join("\n"),
        }
    }
}

/// Legacy `/v1/completions` request, answered through the chat path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: PromptInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequence>,
    #[serde(default)]
    pub stream: bool,
}

impl From<CompletionRequest> for LlmRequest {
    fn from(request: CompletionRequest) -> Self {
        ChatCompletionRequest {
            model: request.model,
            messages: vec![ChatMessage {
                role: MessageRole::User,
                content: MessageContent::Text(request.prompt.into_text()),
                name: None,
            }],
            temperature: request.temperature,
            top_p: request.top_p,
            stream: false,
            stop: request.stop,
            max_tokens: request.max_tokens,
        }
        .into()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub text: String,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    pub usage: Usage,
    /// Partial failure reported alongside the choices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl From<LlmResponse> for CompletionResponse {
    fn from(response: LlmResponse) -> Self {
        Self {
            id: response.id,
            object: "text_completion".to_string(),
            created: response.created,
            model: response.model,
            choices: response
                .choices
                .into_iter()
                .map(|c| CompletionChoice {
                    index: c.index,
                    text: c.message.content,
                    finish_reason: c.finish_reason,
                })
                .collect(),
            usage: response.usage,
            error: response.error,
        }
    }
}
