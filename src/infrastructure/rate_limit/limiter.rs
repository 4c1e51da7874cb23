//! Fixed-window rate limiter
//!
//! Each client key gets a counter that resets once its window has elapsed.
//! A key can be admitted up to twice the limit across a window boundary; the
//! looseness is accepted for an in-process limiter.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Limiter tuning
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Requests admitted per key per window
    pub limit: u32,
    pub window: Duration,
    /// How often idle keys are purged
    pub sweep_interval: Duration,
    /// Keys whose window started longer ago than this are purged
    pub idle_timeout: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            window: Duration::from_secs(1),
            sweep_interval: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Visitor {
    window_start: Instant,
    count: u32,
}

/// Admission control keyed by client identity
///
/// `allow` and `sweep` share one mutex, so concurrent checks for the same key
/// never lose an update.
#[derive(Debug)]
pub struct RateLimiter {
    visitors: Mutex<HashMap<String, Visitor>>,
    config: RateLimiterConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            visitors: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Admit or reject one request from `key`
    pub async fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut visitors = self.visitors.lock().await;

        let Some(visitor) = visitors.get_mut(key) else {
            visitors.insert(
                key.to_string(),
                Visitor {
                    window_start: now,
                    count: 1,
                },
            );
            return true;
        };

        if now.duration_since(visitor.window_start) > self.config.window {
            visitor.count = 0;
            visitor.window_start = now;
        }

        if visitor.count >= self.config.limit {
            return false;
        }

        visitor.count += 1;
        true
    }

    /// Whole seconds a rejected client should wait, at least one
    pub fn retry_after_secs(&self) -> u64 {
        let window = self.config.window;
        let secs = window.as_secs() + u64::from(window.subsec_nanos() > 0);
        secs.max(1)
    }

    /// Drop keys idle for longer than the configured threshold.
    ///
    /// Returns the number of keys removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let idle_timeout = self.config.idle_timeout;

        let mut visitors = self.visitors.lock().await;
        let before = visitors.len();
        visitors.retain(|_, visitor| now.duration_since(visitor.window_start) <= idle_timeout);
        before - visitors.len()
    }

    pub async fn tracked_keys(&self) -> usize {
        self.visitors.lock().await.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}
