//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate endpoint URLs and value ranges
//! - Detect duplicate endpoints
//! - Refuse the placeholder admin key on an exposed admin API
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ManagerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use thiserror::Error;
use url::Url;

use crate::config::schema::{ManagerConfig, PLACEHOLDER_API_KEY};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("endpoint '{url}' is not a valid http(s) URL: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("endpoint '{0}' is listed more than once")]
    DuplicateEndpoint(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("retries.base_delay_ms ({base}) exceeds retries.max_delay_ms ({max})")]
    BackoffRange { base: u64, max: u64 },

    #[error("admin.api_key must be set to a non-default value when the admin API is enabled")]
    WeakApiKey,

    #[error("maintenance.log_retention_secs ({retention}) is shorter than maintenance.stats_window_secs ({window})")]
    RetentionShorterThanWindow { retention: u64, window: u64 },
}

/// Parse an endpoint URL, accepting only absolute http/https URLs.
pub fn parse_endpoint_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme '{}'", other)),
    }
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &ManagerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for raw in &config.endpoints {
        match parse_endpoint_url(raw) {
            Ok(url) => {
                if !seen.insert(url.to_string()) {
                    errors.push(ValidationError::DuplicateEndpoint(raw.clone()));
                }
            }
            Err(reason) => errors.push(ValidationError::InvalidEndpoint {
                url: raw.clone(),
                reason,
            }),
        }
    }

    let non_zero: [(&'static str, u64); 9] = [
        ("limits.max_per_endpoint", config.limits.max_per_endpoint as u64),
        ("limits.max_global", config.limits.max_global as u64),
        ("limits.max_concurrent", config.limits.max_concurrent as u64),
        ("limits.window_secs", config.limits.window_secs),
        ("retries.request_timeout_secs", config.retries.request_timeout_secs),
        ("maintenance.probe_interval_secs", config.maintenance.probe_interval_secs),
        ("maintenance.recompute_interval_secs", config.maintenance.recompute_interval_secs),
        ("maintenance.prune_interval_secs", config.maintenance.prune_interval_secs),
        ("maintenance.probe_timeout_secs", config.maintenance.probe_timeout_secs),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::BackoffRange {
            base: config.retries.base_delay_ms,
            max: config.retries.max_delay_ms,
        });
    }

    if config.maintenance.log_retention_secs < config.maintenance.stats_window_secs {
        errors.push(ValidationError::RetentionShorterThanWindow {
            retention: config.maintenance.log_retention_secs,
            window: config.maintenance.stats_window_secs,
        });
    }

    if config.admin.enabled
        && (config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_API_KEY)
    {
        errors.push(ValidationError::WeakApiKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
