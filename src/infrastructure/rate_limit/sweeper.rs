//! Background purge of idle rate-limit visitors

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::RateLimiter;
use crate::infrastructure::observability::record_rate_limit_visitors;

impl RateLimiter {
    /// Run `sweep` every configured interval until `shutdown` is cancelled
    pub fn spawn_sweeper(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.config().sweep_interval;
            let mut tick = interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            tick.tick().await;

            info!(
                interval_secs = period.as_secs(),
                idle_timeout_secs = self.config().idle_timeout.as_secs(),
                "Starting rate limiter sweeper"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        info!("Rate limiter sweeper shutting down");
                        break;
                    }
                    _ = tick.tick() => {
                        let removed = self.sweep().await;
                        let remaining = self.tracked_keys().await;
                        record_rate_limit_visitors(remaining);

                        if removed > 0 {
                            debug!(removed, remaining, "Swept idle rate limit visitors");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::rate_limit::RateLimiterConfig;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_idle_keys() {
        let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::default()));
        let shutdown = CancellationToken::new();
        let handle = limiter.clone().spawn_sweeper(shutdown.clone());

        limiter.allow("ip:192.168.1.10").await;
        assert_eq!(limiter.tracked_keys().await, 1);

        tokio::time::sleep(Duration::from_secs(361)).await;
        assert_eq!(limiter.tracked_keys().await, 0);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_on_cancel() {
        let limiter = Arc::new(RateLimiter::default());
        let shutdown = CancellationToken::new();
        let handle = limiter.spawn_sweeper(shutdown.clone());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
