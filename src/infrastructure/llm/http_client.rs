use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::domain::llm::DEFAULT_TIMEOUT_SECONDS;
use crate::domain::{ByteStream, DomainError};

/// Provider label used until an adapter relabels the error
const HTTP_LABEL: &str = "http";

/// Ordered header list; later entries replace earlier ones with the same name
pub type Headers = [(String, String)];

/// Trait for HTTP client operations (for mocking)
#[async_trait]
pub trait HttpClientTrait: Send + Sync + std::fmt::Debug {
    async fn get_json(
        &self,
        url: &str,
        headers: &Headers,
    ) -> Result<serde_json::Value, DomainError>;

    async fn post_json(
        &self,
        url: &str,
        headers: &Headers,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError>;

    async fn post_json_stream(
        &self,
        url: &str,
        headers: &Headers,
        body: &serde_json::Value,
    ) -> Result<ByteStream, DomainError>;
}

/// Real HTTP client using reqwest
///
/// The timeout bounds a whole JSON exchange. For streams it bounds only the
/// wait for response headers, so long generations are not cut off.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, timeout })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, DomainError> {
        let response = request.send().await.map_err(send_error)?;
        ensure_success(response).await
    }

    async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, DomainError> {
        let body = response.bytes().await.map_err(send_error)?;

        serde_json::from_slice(&body).map_err(|e| {
            DomainError::decode(HTTP_LABEL, format!("Failed to parse response: {e}"))
        })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn get_json(
        &self,
        url: &str,
        headers: &Headers,
    ) -> Result<serde_json::Value, DomainError> {
        let request = self
            .client
            .get(url)
            .headers(header_map(headers)?)
            .timeout(self.timeout);

        let response = self.send(request).await?;
        Self::read_json(response).await
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &Headers,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        let request = self
            .client
            .post(url)
            .headers(header_map(headers)?)
            .json(body)
            .timeout(self.timeout);

        let response = self.send(request).await?;
        Self::read_json(response).await
    }

    async fn post_json_stream(
        &self,
        url: &str,
        headers: &Headers,
        body: &serde_json::Value,
    ) -> Result<ByteStream, DomainError> {
        let request = self.client.post(url).headers(header_map(headers)?).json(body);

        let response = tokio::time::timeout(self.timeout, self.send(request))
            .await
            .map_err(|_| {
                DomainError::timeout(
                    HTTP_LABEL,
                    format!("No response headers within {:?}", self.timeout),
                )
            })??;

        let stream = response.bytes_stream().map(|result| {
            result.map_err(|e| DomainError::transport(HTTP_LABEL, format!("Stream error: {e}")))
        });

        Ok(Box::pin(stream))
    }
}

fn header_map(headers: &Headers) -> Result<HeaderMap, DomainError> {
    let mut map = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            DomainError::configuration(format!("Invalid header name {name:?}: {e}"))
        })?;
        // The value may be a credential, keep it out of the message.
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| DomainError::configuration(format!("Invalid value for header {name}")))?;

        map.insert(header_name, header_value);
    }

    Ok(map)
}

fn send_error(error: reqwest::Error) -> DomainError {
    if error.is_timeout() {
        DomainError::timeout(HTTP_LABEL, format!("Request timed out: {error}"))
    } else {
        DomainError::transport(HTTP_LABEL, format!("Request failed: {error}"))
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, DomainError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(DomainError::upstream(HTTP_LABEL, status.as_u16(), body))
}
