use thiserror::Error;

/// Maximum number of upstream body bytes kept for diagnostics
pub const MAX_UPSTREAM_BODY_LEN: usize = 1024;

/// Core domain errors
///
/// Every failure the gateway can produce is one of these kinds. Adapters label
/// provider-side failures with the provider name so the HTTP layer never needs
/// provider-specific knowledge.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Unknown provider: {name}")]
    UnknownProvider { name: String },

    #[error("Provider already registered: {name}")]
    DuplicateProvider { name: String },

    #[error("Model not found: {provider}/{model}")]
    ModelNotFound { provider: String, model: String },

    #[error("Rate limit exceeded for {client_key}")]
    RateLimited {
        client_key: String,
        retry_after_secs: u64,
    },

    #[error("Upstream error: {provider} returned HTTP {status}: {body}")]
    Upstream {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Transport error: {provider} - {message}")]
    Transport {
        provider: String,
        message: String,
        timed_out: bool,
    },

    #[error("Decode error: {provider} - {message}")]
    Decode { provider: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl DomainError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn unknown_provider(name: impl Into<String>) -> Self {
        Self::UnknownProvider { name: name.into() }
    }

    pub fn duplicate_provider(name: impl Into<String>) -> Self {
        Self::DuplicateProvider { name: name.into() }
    }

    pub fn model_not_found(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self::ModelNotFound {
            provider: provider.into(),
            model: model.into(),
        }
    }

    pub fn rate_limited(client_key: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::RateLimited {
            client_key: client_key.into(),
            retry_after_secs,
        }
    }

    pub fn upstream(provider: impl Into<String>, status: u16, body: impl AsRef<str>) -> Self {
        Self::Upstream {
            provider: provider.into(),
            status,
            body: truncate_body(body.as_ref()),
        }
    }

    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
            timed_out: true,
        }
    }

    pub fn decode(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Relabel a provider-side error with the adapter that produced it.
    ///
    /// The HTTP client only knows URLs; adapters call this so upstream,
    /// transport and decode failures name the provider.
    pub fn with_provider(self, name: &str) -> Self {
        match self {
            Self::Upstream { status, body, .. } => Self::Upstream {
                provider: name.to_string(),
                status,
                body,
            },
            Self::Transport {
                message, timed_out, ..
            } => Self::Transport {
                provider: name.to_string(),
                message,
                timed_out,
            },
            Self::Decode { message, .. } => Self::Decode {
                provider: name.to_string(),
                message,
            },
            other => other,
        }
    }

    /// Whether repeating the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Upstream { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether the failure is the caller's fault rather than the provider's
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest { .. }
                | Self::UnknownProvider { .. }
                | Self::ModelNotFound { .. }
                | Self::RateLimited { .. }
        )
    }
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_UPSTREAM_BODY_LEN {
        return body.to_string();
    }

    let mut end = MAX_UPSTREAM_BODY_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...[truncated {} bytes]", &body[..end], body.len() - end)
}
