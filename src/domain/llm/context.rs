//! Per-request execution context

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::ByteStream;
use crate::domain::DomainError;

/// Identity, cancellation and deadline of one inbound call
///
/// Every adapter operation receives a context. A client disconnect cancels
/// the token and a gateway-level timeout sets the deadline, so upstream work
/// is aborted instead of leaking.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    client_key: String,
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, client_key: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            client_key: client_key.into(),
            cancellation: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Context for internal calls that have no inbound client
    pub fn background() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), "internal")
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn client_key(&self) -> &str {
        &self.client_key
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Time left before the deadline, `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Drive `fut` until it completes, the context is cancelled or the
    /// deadline passes, whichever comes first.
    pub async fn run<T, F>(&self, provider: &str, fut: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        if self.is_cancelled() {
            return Err(DomainError::transport(provider, "request cancelled"));
        }

        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => {
                    Err(DomainError::transport(provider, "request cancelled"))
                }
                _ = tokio::time::sleep_until(deadline) => {
                    Err(DomainError::timeout(provider, "request deadline exceeded"))
                }
                result = fut => result,
            },
            None => tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => {
                    Err(DomainError::transport(provider, "request cancelled"))
                }
                result = fut => result,
            },
        }
    }

    /// Stop yielding from `stream` once this context is cancelled.
    ///
    /// The upstream body is dropped with the returned stream, which releases
    /// the connection.
    pub fn guard_stream(&self, stream: ByteStream) -> ByteStream {
        Box::pin(stream.take_until(self.cancellation.clone().cancelled_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;

    #[tokio::test]
    async fn test_run_returns_inner_result() {
        let ctx = RequestContext::new("req-1", "ip:127.0.0.1");
        let value = ctx.run("openai", async { Ok::<_, DomainError>(42) }).await;
        assert_eq!(value.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_run_aborts_when_cancelled() {
        let ctx = RequestContext::new("req-1", "ip:127.0.0.1");
        ctx.cancel();

        let result = ctx
            .run("openai", std::future::pending::<Result<(), DomainError>>())
            .await;

        assert!(matches!(
            result,
            Err(DomainError::Transport { timed_out: false, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out_at_deadline() {
        let ctx = RequestContext::new("req-1", "ip:127.0.0.1").with_timeout(Duration::from_secs(5));

        let result = ctx
            .run("anthropic", std::future::pending::<Result<(), DomainError>>())
            .await;

        match result {
            Err(DomainError::Transport {
                provider,
                timed_out,
                ..
            }) => {
                assert_eq!(provider, "anthropic");
                assert!(timed_out);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_guard_stream_stops_after_cancel() {
        let ctx = RequestContext::new("req-1", "api_key:abc");
        let upstream: ByteStream = Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"data: 1\n\n")),
            Ok(Bytes::from_static(b"data: 2\n\n")),
        ]));

        let mut guarded = ctx.guard_stream(upstream);
        let first = guarded.next().await;
        assert!(first.is_some());

        ctx.cancel();
        assert!(guarded.next().await.is_none());
    }

    #[test]
    fn test_remaining_without_deadline() {
        let ctx = RequestContext::background();
        assert!(ctx.remaining().is_none());
        assert_eq!(ctx.client_key(), "internal");
    }
}
