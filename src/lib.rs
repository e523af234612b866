//! Client-side RPC connection manager.
//!
//! Spreads read requests across several upstream RPC endpoints, picks the
//! healthiest one, enforces rate limits, backs off and retries on failure and
//! quarantines misbehaving endpoints.
//!
//! ```text
//!  caller ──▶ RpcManager::execute_with_fallback
//!                 │
//!                 ├─▶ health::scorer      (pick best eligible endpoint)
//!                 ├─▶ resilience::throttle (per-endpoint / global / concurrency)
//!                 ├─▶ operation(RpcConnection)
//!                 └─▶ resilience::circuit_breaker (stats + cooldown)
//!
//!  health::maintainer ──▶ probes, stats recompute, log pruning (own task)
//! ```

pub mod admin;
pub mod blockchain;
pub mod cache;
pub mod config;
pub mod endpoint;
pub mod health;
pub mod lifecycle;
pub mod manager;
pub mod observability;
pub mod resilience;

pub use blockchain::{Probe, RpcConnection, RpcError, RpcResult};
pub use cache::TtlCache;
pub use config::ManagerConfig;
pub use health::{EndpointStatus, StatusReport};
pub use lifecycle::Shutdown;
pub use manager::RpcManager;
