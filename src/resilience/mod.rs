//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! execute_with_fallback (retries.rs):
//!     → throttle.rs (cooldown, rate windows, concurrency)
//!         throttled → backoff.rs sleep, re-select, no attempt consumed
//!     → operation under timeout
//!     → circuit_breaker.rs (classify failure, update counters, cooldown)
//!     → backoff.rs sleep → next attempt, or return last error
//! ```

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod throttle;

pub use circuit_breaker::FailureClass;
pub use throttle::{ThrottleGuard, ThrottleReason};
