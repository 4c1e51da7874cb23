//! Process-local admission control

mod limiter;
mod sweeper;

pub use limiter::{RateLimiter, RateLimiterConfig};
