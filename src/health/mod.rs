//! Health subsystem.
//!
//! # Data Flow
//! ```text
//! Selection (scorer.rs):
//!     Endpoint stats → health score → best eligible endpoint
//!
//! Maintenance (maintainer.rs):
//!     Periodic timers
//!     → probe endpoints outside cooldown
//!     → recompute success rate / latency
//!     → prune request logs
//!
//! Reporting (status.rs):
//!     Endpoint stats → Healthy / Degraded / Unhealthy / Cooldown
//! ```

pub mod maintainer;
pub mod scorer;
pub mod status;

pub use maintainer::Maintainer;
pub use status::{EndpointReport, EndpointSnapshot, EndpointStatus, StatusReport};
