//! Error definitions for RPC operations.

use alloy::transports::{TransportError, TransportErrorKind};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by RPC operations and by the manager around them.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// Upstream answered with a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection or transport-level failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The operation did not finish before its deadline.
    #[error("RPC timeout after {0:?}")]
    Timeout(Duration),

    /// The caller dropped the call while the attempt was in flight.
    #[error("RPC attempt cancelled")]
    Cancelled,

    /// No endpoints are registered.
    #[error("No RPC endpoints configured")]
    NoEndpoints,

    /// Endpoint URL could not be parsed.
    #[error("Invalid endpoint URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Endpoint is not registered.
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// Manager settings failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Anything else reported by an operation.
    #[error("{0}")]
    Other(String),
}

impl RpcError {
    /// HTTP status code carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            RpcError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<TransportError> for RpcError {
    fn from(err: TransportError) -> Self {
        match err.as_transport_err() {
            Some(TransportErrorKind::HttpError(http)) => RpcError::Http {
                status: http.status,
                message: http.body.clone(),
            },
            _ => RpcError::Transport(err.to_string()),
        }
    }
}

/// Result type for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;
