//! Blockchain connectivity subsystem.
//!
//! # Data Flow
//! ```text
//! Endpoint URL
//!     → client.rs (alloy provider per endpoint)
//!     → handed to caller operations as RpcConnection
//!     → failures surface as types.rs RpcError
//! ```
//!
//! The manager never interprets payloads; operations decide what to call.

pub mod client;
pub mod types;

pub use client::{block_number_probe, Probe, RpcConnection};
pub use types::{RpcError, RpcResult};
