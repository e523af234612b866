//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the manager.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the RPC connection manager.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ManagerConfig {
    /// Candidate upstream RPC endpoint URLs, in priority order.
    pub endpoints: Vec<String>,

    /// Rate and concurrency ceilings.
    pub limits: LimitsConfig,

    /// Retry and backoff settings.
    pub retries: RetryConfig,

    /// Cooldown durations per failure class.
    pub cooldown: CooldownConfig,

    /// Background maintenance timers.
    pub maintenance: MaintenanceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Throttle ceilings, evaluated over a sliding window.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum dispatched requests per endpoint within the window.
    pub max_per_endpoint: usize,

    /// Maximum dispatched requests across all endpoints within the window.
    pub max_global: usize,

    /// Maximum in-flight requests.
    pub max_concurrent: usize,

    /// Sliding window length in seconds.
    pub window_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_per_endpoint: 45,
            max_global: 100,
            max_concurrent: 10,
            window_secs: 60,
        }
    }
}

impl LimitsConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt (total attempts = max_retries + 1).
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds (before jitter).
    pub max_delay_ms: u64,

    /// Upper bound of the random jitter added to every backoff.
    pub jitter_ms: u64,

    /// Deadline for a single dispatched operation in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            jitter_ms: 1_000,
            request_timeout_secs: 30,
        }
    }
}

impl RetryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Cooldown durations applied by the circuit breaker.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Rate-limit cooldown grows by this much per consecutive error.
    pub rate_limit_step_secs: u64,

    /// Rate-limit cooldown cap.
    pub rate_limit_max_secs: u64,

    /// Server-error cooldown grows by this much per consecutive error.
    pub server_error_step_secs: u64,

    /// Server-error cooldown cap.
    pub server_error_max_secs: u64,

    /// Fixed cooldown after 401/403.
    pub auth_secs: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            rate_limit_step_secs: 10,
            rate_limit_max_secs: 60,
            server_error_step_secs: 5,
            server_error_max_secs: 30,
            auth_secs: 300,
        }
    }
}

/// Periodic maintenance configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Run the background maintainer.
    pub enabled: bool,

    /// Health probe interval in seconds.
    pub probe_interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub probe_timeout_secs: u64,

    /// Stats recomputation interval in seconds.
    pub recompute_interval_secs: u64,

    /// Log pruning interval in seconds.
    pub prune_interval_secs: u64,

    /// Trailing window used for success rate and latency, in seconds.
    pub stats_window_secs: u64,

    /// Per-endpoint request log retention in seconds.
    pub log_retention_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            probe_interval_secs: 120,
            probe_timeout_secs: 10,
            recompute_interval_secs: 60,
            prune_interval_secs: 300,
            stats_window_secs: 600,
            log_retention_secs: 3_600,
        }
    }
}

impl MaintenanceConfig {
    pub fn stats_window(&self) -> Duration {
        Duration::from_secs(self.stats_window_secs)
    }

    pub fn log_retention(&self) -> Duration {
        Duration::from_secs(self.log_retention_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Default admin key. Refused by validation while the admin API is enabled.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,

    /// Per-request timeout for admin handlers in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
            request_timeout_secs: 10,
        }
    }
}
