//! Endpoint status reporting.
//!
//! # States
//! - Cooldown: excluded from selection until the cooldown expires
//! - Healthy: success rate above 90% and no consecutive errors
//! - Degraded: success rate above 50%
//! - Unhealthy: everything else
//!
//! Status is derived on demand and never stored.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Cooldown,
}

/// One row of the status report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointReport {
    pub url: String,
    pub status: EndpointStatus,
    pub success_rate: f64,
    /// Milliseconds.
    pub avg_response_time: f64,
    pub error_count: f64,
    pub in_cooldown: bool,
}

/// Snapshot returned by `RpcManager::endpoint_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub current_endpoint: Option<String>,
    pub endpoints: Vec<EndpointReport>,
}

/// Full copy of one endpoint's counters, for operators and tests.
#[derive(Debug, Clone)]
pub struct EndpointSnapshot {
    pub url: String,
    pub status: EndpointStatus,
    pub request_count: u64,
    pub error_count: f64,
    pub consecutive_errors: u32,
    pub success_rate: f64,
    pub avg_response_time: f64,
    pub last_request_time: Option<Instant>,
    pub last_error_time: Option<Instant>,
    pub cooldown_until: Option<Instant>,
    pub cooldown_remaining: Option<Duration>,
    pub log_len: usize,
}
