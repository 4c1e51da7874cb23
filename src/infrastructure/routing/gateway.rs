//! Request orchestration: admission, provider selection, retries, accounting

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use super::{ModelRoutes, ProviderRegistry, RetryPolicy};
use crate::domain::{
    ByteStream, DomainError, EmbeddingRequest, EmbeddingResponse, LlmProvider, LlmRequest,
    LlmResponse, ModelInfo, Pricing, RequestContext,
};
use crate::infrastructure::observability::{
    CallOutcome, ProviderCallMetricParams, record_provider_call, record_provider_retry,
    record_rate_limited,
};
use crate::infrastructure::rate_limit::RateLimiter;

/// Content type of passthrough streams; both supported vendors emit SSE
pub const STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Metric label for model ids outside the adapter's static tables
const OTHER_MODEL_LABEL: &str = "other";

/// How the target provider is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSelector {
    /// Use this provider, model id forwarded untouched
    Explicit(String),
    /// Derive the provider from the request's model id
    ByModel,
}

/// A completed chat call
#[derive(Debug)]
pub struct CompletionOutcome {
    pub provider: String,
    pub response: LlmResponse,
    pub cost: f64,
    pub currency: String,
}

/// An established stream; the caller owns the connection from here on
pub struct StreamOutcome {
    pub provider: String,
    pub model: String,
    pub content_type: &'static str,
    pub stream: ByteStream,
}

impl std::fmt::Debug for StreamOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOutcome")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Front door for every canonical operation
#[derive(Debug)]
pub struct Gateway {
    registry: Arc<ProviderRegistry>,
    routes: ModelRoutes,
    limiter: Option<Arc<RateLimiter>>,
    retry: RetryPolicy,
}

impl Gateway {
    pub fn new(registry: Arc<ProviderRegistry>, routes: ModelRoutes, retry: RetryPolicy) -> Self {
        Self {
            registry,
            routes,
            limiter: None,
            retry,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.limiter.as_ref()
    }

    pub async fn providers(&self) -> Vec<String> {
        self.registry.names().await
    }

    pub async fn chat(
        &self,
        ctx: &RequestContext,
        selector: &ProviderSelector,
        request: LlmRequest,
    ) -> Result<CompletionOutcome, DomainError> {
        self.admit(ctx).await?;
        request.validate()?;

        let (provider, model) = self.select(selector, &request.model).await?;
        let mut request = request.with_model(model);
        request.stream = false;

        debug!(
            request_id = %ctx.request_id(),
            provider = %provider.name(),
            model = %request.model,
            "Dispatching chat completion"
        );

        let started = Instant::now();
        let result = self
            .with_retries(ctx, &provider, "chat", self.retry.retry_completions, || {
                provider.send_request(ctx, &request)
            })
            .await;

        let usage = result.as_ref().ok().map(|response| response.usage);
        record_provider_call(ProviderCallMetricParams {
            provider: provider.name(),
            model: model_label(provider.as_ref(), &request.model),
            operation: "chat",
            duration: started.elapsed(),
            outcome: outcome(&result),
            input_tokens: usage.map(|u| u64::from(u.prompt_tokens)),
            output_tokens: usage.map(|u| u64::from(u.completion_tokens)),
        });

        let response = result?;
        let pricing = provider.get_pricing(&request.model);

        Ok(CompletionOutcome {
            provider: provider.name().to_string(),
            cost: pricing.cost_for(&response.usage),
            currency: pricing.currency,
            response,
        })
    }

    /// Establish a passthrough stream
    ///
    /// Only establishment may be retried; once the stream is returned the
    /// gateway never repeats the call.
    pub async fn chat_stream(
        &self,
        ctx: &RequestContext,
        selector: &ProviderSelector,
        request: LlmRequest,
    ) -> Result<StreamOutcome, DomainError> {
        self.admit(ctx).await?;
        request.validate()?;

        let (provider, model) = self.select(selector, &request.model).await?;
        let mut request = request.with_model(model);
        request.stream = true;

        debug!(
            request_id = %ctx.request_id(),
            provider = %provider.name(),
            model = %request.model,
            "Opening completion stream"
        );

        let started = Instant::now();
        let result = self
            .with_retries(ctx, &provider, "chat_stream", self.retry.retry_completions, || {
                provider.send_stream_request(ctx, &request)
            })
            .await;

        record_provider_call(ProviderCallMetricParams {
            provider: provider.name(),
            model: model_label(provider.as_ref(), &request.model),
            operation: "chat_stream",
            duration: started.elapsed(),
            outcome: outcome(&result),
            input_tokens: None,
            output_tokens: None,
        });

        Ok(StreamOutcome {
            provider: provider.name().to_string(),
            model: request.model,
            content_type: STREAM_CONTENT_TYPE,
            stream: result?,
        })
    }

    pub async fn embeddings(
        &self,
        ctx: &RequestContext,
        selector: &ProviderSelector,
        request: EmbeddingRequest,
    ) -> Result<(String, EmbeddingResponse), DomainError> {
        self.admit(ctx).await?;
        request.validate()?;

        let (provider, model) = self.select(selector, &request.model).await?;
        let request = request.with_model(model);

        let started = Instant::now();
        let result = self
            .with_retries(ctx, &provider, "embeddings", self.retry.retry_completions, || {
                provider.create_embeddings(ctx, &request)
            })
            .await;

        record_provider_call(ProviderCallMetricParams {
            provider: provider.name(),
            model: model_label(provider.as_ref(), &request.model),
            operation: "embeddings",
            duration: started.elapsed(),
            outcome: outcome(&result),
            input_tokens: result
                .as_ref()
                .ok()
                .map(|r| u64::from(r.usage.prompt_tokens)),
            output_tokens: None,
        });

        Ok((provider.name().to_string(), result?))
    }

    /// Models of one provider, or of every registered provider
    ///
    /// When listing everything, a failing provider is skipped as long as at
    /// least one other provider answers.
    pub async fn list_models(
        &self,
        ctx: &RequestContext,
        provider: Option<&str>,
    ) -> Result<Vec<ModelInfo>, DomainError> {
        self.admit(ctx).await?;

        if let Some(name) = provider {
            let provider = self.registry.resolve(name).await?;
            return self.fetch_models(ctx, &provider).await;
        }

        let mut models = Vec::new();
        let mut last_error = None;
        let mut any_succeeded = false;

        for name in self.registry.names().await {
            let provider = self.registry.resolve(&name).await?;
            match self.fetch_models(ctx, &provider).await {
                Ok(listed) => {
                    any_succeeded = true;
                    models.extend(listed);
                }
                Err(e) => {
                    warn!(provider = %name, error = %e, "Failed to list provider models");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_succeeded => Err(e),
            _ => Ok(models),
        }
    }

    /// Look up a model on the provider that would serve it
    pub async fn model_info(
        &self,
        ctx: &RequestContext,
        model_id: &str,
    ) -> Result<ModelInfo, DomainError> {
        self.admit(ctx).await?;

        let (provider, model) = self.select(&ProviderSelector::ByModel, model_id).await?;
        self.with_retries(ctx, &provider, "model_info", true, || {
            provider.get_model_info(ctx, &model)
        })
        .await
    }

    pub async fn pricing(
        &self,
        ctx: &RequestContext,
        provider: &str,
        model_id: &str,
    ) -> Result<Pricing, DomainError> {
        self.admit(ctx).await?;

        let provider = self.registry.resolve(provider).await?;
        Ok(provider.get_pricing(model_id))
    }

    async fn fetch_models(
        &self,
        ctx: &RequestContext,
        provider: &Arc<dyn LlmProvider>,
    ) -> Result<Vec<ModelInfo>, DomainError> {
        let started = Instant::now();
        let result = self
            .with_retries(ctx, provider, "models", true, || provider.get_models(ctx))
            .await;

        record_provider_call(ProviderCallMetricParams {
            provider: provider.name(),
            model: "",
            operation: "models",
            duration: started.elapsed(),
            outcome: outcome(&result),
            input_tokens: None,
            output_tokens: None,
        });

        result
    }

    async fn admit(&self, ctx: &RequestContext) -> Result<(), DomainError> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };

        if limiter.allow(ctx.client_key()).await {
            return Ok(());
        }

        record_rate_limited();
        warn!(
            request_id = %ctx.request_id(),
            client_key = %ctx.client_key(),
            "Rate limit exceeded"
        );

        Err(DomainError::rate_limited(
            ctx.client_key(),
            limiter.retry_after_secs(),
        ))
    }

    async fn select(
        &self,
        selector: &ProviderSelector,
        model: &str,
    ) -> Result<(Arc<dyn LlmProvider>, String), DomainError> {
        match selector {
            ProviderSelector::Explicit(name) => {
                let provider = self.registry.resolve(name).await?;
                Ok((provider, model.to_string()))
            }
            ProviderSelector::ByModel => {
                let registered = self.registry.names().await;
                let route = self.routes.resolve(model, &registered)?;
                let provider = self.registry.resolve(&route.provider).await?;
                Ok((provider, route.model))
            }
        }
    }

    /// Run `call` once, then again on retryable failures while budget remains
    async fn with_retries<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        provider: &Arc<dyn LlmProvider>,
        operation: &'static str,
        retry_allowed: bool,
        mut call: F,
    ) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let max_retries = if retry_allowed {
            provider.max_retries()
        } else {
            0
        };
        let mut attempt = 0;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_retries && e.is_retryable() && !ctx.is_cancelled() => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    attempt += 1;

                    warn!(
                        request_id = %ctx.request_id(),
                        provider = %provider.name(),
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying provider call"
                    );
                    record_provider_retry(provider.name(), operation);

                    ctx.run(provider.name(), async {
                        tokio::time::sleep(delay).await;
                        Ok(())
                    })
                    .await?;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Client-chosen ids are collapsed so the metric series stay bounded
fn model_label<'a>(provider: &dyn LlmProvider, model: &'a str) -> &'a str {
    if provider.is_known_model(model) {
        model
    } else {
        OTHER_MODEL_LABEL
    }
}

fn outcome<T>(result: &Result<T, DomainError>) -> CallOutcome {
    if result.is_ok() {
        CallOutcome::Success
    } else {
        CallOutcome::Error
    }
}
