//! Per-attempt throttling.
//!
//! An attempt is held back when the endpoint is cooling down, when the
//! endpoint or the whole manager already dispatched its quota within the
//! sliding window, or when too many requests are in flight.
//!
//! Only dispatched attempts count toward the windows; throttled spins do not.

use tokio::time::Instant;

use crate::config::LimitsConfig;
use crate::endpoint::state::{EndpointState, GlobalRequestLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleReason {
    Cooldown,
    EndpointLimit,
    GlobalLimit,
    Concurrency,
}

impl ThrottleReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThrottleReason::Cooldown => "cooldown",
            ThrottleReason::EndpointLimit => "endpoint_limit",
            ThrottleReason::GlobalLimit => "global_limit",
            ThrottleReason::Concurrency => "concurrency",
        }
    }
}

/// Evaluates the throttle ceilings against current counters.
#[derive(Debug, Clone, Copy)]
pub struct ThrottleGuard<'a> {
    limits: &'a LimitsConfig,
}

impl<'a> ThrottleGuard<'a> {
    pub fn new(limits: &'a LimitsConfig) -> Self {
        Self { limits }
    }

    /// First ceiling the attempt would violate, if any.
    pub fn check(
        &self,
        endpoint: &EndpointState,
        global: &GlobalRequestLog,
        pending_requests: usize,
        now: Instant,
    ) -> Option<ThrottleReason> {
        let window = self.limits.window();
        if endpoint.in_cooldown(now) {
            Some(ThrottleReason::Cooldown)
        } else if endpoint.requests_within(now, window) >= self.limits.max_per_endpoint {
            Some(ThrottleReason::EndpointLimit)
        } else if global.count_within(now, window) >= self.limits.max_global {
            Some(ThrottleReason::GlobalLimit)
        } else if pending_requests >= self.limits.max_concurrent {
            Some(ThrottleReason::Concurrency)
        } else {
            None
        }
    }

    pub fn should_throttle(
        &self,
        endpoint: &EndpointState,
        global: &GlobalRequestLog,
        pending_requests: usize,
        now: Instant,
    ) -> bool {
        self.check(endpoint, global, pending_requests, now).is_some()
    }
}
