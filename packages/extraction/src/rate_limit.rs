//! Keyed request rate limiting.
//!
//! Callers pass the window and limit on each call, so one limiter can serve
//! several endpoints with different policies (`covers:{ip}`,
//! `image-proxy:{ip}`).

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Decides whether a keyed request may proceed.
pub trait RateLimiter: Send + Sync {
    /// Record an attempt for `key` and report whether it is allowed.
    ///
    /// At most `max` attempts are allowed per `window`.
    fn allow(&self, key: &str, window: Duration, max: u32) -> bool;
}

/// Window and limit for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub max: u32,
}

impl RateLimitPolicy {
    pub fn new(window: Duration, max: u32) -> Self {
        Self { window, max }
    }

    /// Check `key` against this policy.
    pub fn check(&self, limiter: &dyn RateLimiter, key: &str) -> bool {
        limiter.allow(key, self.window, self.max)
    }

    /// GCRA quota: a burst of `max`, replenished one cell every `window / max`.
    ///
    /// `None` when the window is zero.
    fn quota(&self) -> Option<Quota> {
        let burst = NonZeroU32::new(self.max)?;
        Quota::with_period(self.window / self.max).map(|quota| quota.allow_burst(burst))
    }
}

type KeyedLimiter = DefaultKeyedRateLimiter<String>;

/// In-process limiter backed by `governor`.
///
/// One keyed GCRA limiter is kept per distinct policy. Denied attempts do
/// not consume capacity.
#[derive(Default)]
pub struct InMemoryRateLimiter {
    limiters: RwLock<HashMap<RateLimitPolicy, Arc<KeyedLimiter>>>,
}

impl std::fmt::Debug for InMemoryRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRateLimiter")
            .field("tracked_keys", &self.tracked_keys())
            .finish()
    }
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn limiter_for(&self, policy: RateLimitPolicy) -> Option<Arc<KeyedLimiter>> {
        if let Some(limiter) = self
            .limiters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&policy)
        {
            return Some(Arc::clone(limiter));
        }

        let quota = policy.quota()?;
        let mut limiters = self.limiters.write().unwrap_or_else(PoisonError::into_inner);
        Some(Arc::clone(
            limiters
                .entry(policy)
                .or_insert_with(|| Arc::new(governor::RateLimiter::keyed(quota))),
        ))
    }

    /// Forget keys whose state has fully replenished.
    ///
    /// Call periodically; keyed state otherwise grows with every client seen.
    pub fn retain_recent(&self) {
        let limiters = self.limiters.read().unwrap_or_else(PoisonError::into_inner);
        for limiter in limiters.values() {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Number of keys currently tracked across all policies.
    pub fn tracked_keys(&self) -> usize {
        self.limiters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|limiter| limiter.len())
            .sum()
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn allow(&self, key: &str, window: Duration, max: u32) -> bool {
        if max == 0 {
            return false;
        }

        // A zero window places no limit.
        let Some(limiter) = self.limiter_for(RateLimitPolicy::new(window, max)) else {
            return true;
        };

        let allowed = limiter.check_key(&key.to_string()).is_ok();
        if !allowed {
            debug!(key = %key, max, "Rate limit exceeded");
        }
        allowed
    }
}
