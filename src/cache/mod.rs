//! Caching utilities for collaborators of the manager.

pub mod ttl;

pub use ttl::TtlCache;
