//! Application shell.
//!
//! # Data Flow
//! ```text
//! Transport calls GBuilder::handle_connection(scope, receive, send)
//!     → attach State + connection tracking to the scope
//!     → middleware stack (built lazily on first connection):
//!         ServerErrorMiddleware
//!         → user middleware (first declared = outermost)
//!         → ExceptionMiddleware
//!         → Router (dispatch → route handler | close | lifespan)
//! ```
//!
//! # Design Decisions
//! - Every layer implements the same `Application` contract
//! - The route table is frozen once the stack is built
//! - `State` is passed explicitly through the scope, never global

pub mod application;
pub mod builder;
pub mod exceptions;
pub mod middleware;
pub mod state;

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::AppError;
use crate::websocket::message::{InboundRx, OutboundTx};
use crate::websocket::ConnectionScope;

pub use application::GBuilder;
pub use builder::AppBuilder;
pub use exceptions::{ErrorResponder, ExceptionHandler, ExceptionKey};
pub use middleware::Middleware;
pub use state::State;

pub type AppFuture = BoxFuture<'static, Result<(), AppError>>;

/// Something that serves one connection scope.
pub trait Application: Send + Sync + 'static {
    fn call(self: Arc<Self>, scope: ConnectionScope, receive: InboundRx, send: OutboundTx) -> AppFuture;
}
