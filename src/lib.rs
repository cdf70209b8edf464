//! gbuilder: a WebSocket-only application framework.
//!
//! Routes are matched in registration order against each incoming websocket
//! connection; the first full match wins, the first partial match is the
//! fallback, and unmatched connections are refused during the handshake.
//! A process-wide lifespan scope runs startup and shutdown hooks.

// Core subsystems
pub mod app;
pub mod error;
pub mod routing;
pub mod websocket;

// Hosting
pub mod config;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use app::{AppBuilder, Application, GBuilder, Middleware, State};
pub use config::AppConfig;
pub use error::{AppError, HandlerError};
pub use http::HttpServer;
pub use lifecycle::{LifespanEvent, LifespanHandler, Shutdown};
pub use routing::{ParamValue, PathParams, Route, Router, UrlPath};
pub use websocket::{ConnectionScope, Frame, Inbound, Outbound, WebSocket};
