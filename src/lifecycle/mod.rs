//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Lifespan protocol (lifespan.rs):
//!     Startup event → startup hooks / lifespan handler → StartupComplete | StartupFailed
//!     Shutdown event → shutdown hooks / lifespan handler → ShutdownComplete | ShutdownFailed
//!
//! Startup (startup.rs):
//!     Spawn lifespan scope → send Startup → wait for completion → accept traffic
//!
//! Shutdown (shutdown.rs):
//!     Signal received → stop accepting → close live sockets (1001) → drain → lifespan Shutdown
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Either startup/shutdown hooks or one lifespan handler, never both
//! - Hooks run in registration order, sequentially
//! - Fail fast: a failed startup stops the server before it accepts traffic
//! - Draining has a deadline: forced exit after the grace period

pub mod lifespan;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use lifespan::{Lifespan, LifespanEvent, LifespanHandler};
pub use shutdown::Shutdown;
pub use startup::LifespanDriver;
