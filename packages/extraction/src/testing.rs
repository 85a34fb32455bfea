//! Testing utilities including mock implementations.
//!
//! Useful for testing applications that consult a [`RateLimiter`] without
//! depending on wall-clock timing.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::rate_limit::RateLimiter;

/// A rate limiter with a fixed answer.
///
/// Every call is recorded so tests can assert which keys were consulted.
#[derive(Debug, Clone)]
pub struct MockRateLimiter {
    allow: bool,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockRateLimitCall>>>,
}

/// Record of a call made to the mock limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRateLimitCall {
    pub key: String,
    pub window: Duration,
    pub max: u32,
}

impl MockRateLimiter {
    /// A limiter that allows every request.
    pub fn allowing() -> Self {
        Self {
            allow: true,
            calls: Arc::default(),
        }
    }

    /// A limiter that denies every request.
    pub fn denying() -> Self {
        Self {
            allow: false,
            calls: Arc::default(),
        }
    }

    /// Get all calls made to this limiter.
    pub fn calls(&self) -> Vec<MockRateLimitCall> {
        self.calls.read().map(|c| c.clone()).unwrap_or_default()
    }

    /// Keys consulted, in call order.
    pub fn keys(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.key).collect()
    }

    /// Clear call history.
    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.write() {
            calls.clear();
        }
    }
}

impl RateLimiter for MockRateLimiter {
    fn allow(&self, key: &str, window: Duration, max: u32) -> bool {
        if let Ok(mut calls) = self.calls.write() {
            calls.push(MockRateLimitCall {
                key: key.to_string(),
                window,
                max,
            });
        }
        self.allow
    }
}
