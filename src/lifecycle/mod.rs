//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Init logging/metrics → Build manager
//!     → Start maintainer, admin API, config watcher
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C / SIGTERM → broadcast → maintainer and admin API exit
//! ```

pub mod shutdown;

pub use shutdown::{wait_for_signal, Shutdown};
