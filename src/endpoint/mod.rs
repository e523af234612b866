//! Endpoint subsystem.
//!
//! # Data Flow
//! ```text
//! Configured URL
//!     → registry.rs (ordered list, current pointer)
//!     → state.rs (stats record + request log per endpoint)
//!     → read by health scoring, throttling and status reporting
//! ```

pub mod registry;
pub mod state;

pub use registry::EndpointRegistry;
pub use state::{EndpointState, GlobalRequestLog, RequestLogEntry};
