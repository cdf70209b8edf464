//! HTTP hosting adapter.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → upgrade.rs (capacity check, run the application, handshake)
//!         → request.rs (HTTP request → ConnectionScope)
//!         → Accept → 101 + frame pump | Close → 403
//! ```
//!
//! # Design Decisions
//! - The application decides the handshake; the adapter never routes
//! - Plain HTTP requests get 426 Upgrade Required

pub mod request;
pub mod server;
pub mod tls;
pub mod upgrade;

pub use request::{websocket_scope, X_REQUEST_ID};
pub use server::{HttpServer, ServerError};
