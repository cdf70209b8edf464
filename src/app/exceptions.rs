//! Error handling layers.
//!
//! # Responsibilities
//! - `ExceptionMiddleware` (innermost): route handler errors to registered
//!   exception handlers, or close the socket for `HandlerError::WebSocket`
//! - `ServerErrorMiddleware` (outermost): log whatever is left and close the
//!   socket with 1011
//!
//! # Design Decisions
//! - A client disconnect is a normal end of a connection, not a failure
//! - Close reasons expose error text only in debug mode

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::app::{AppFuture, Application};
use crate::error::{AppError, HandlerError};
use crate::websocket::message::{InboundRx, Outbound, OutboundTx, CLOSE_INTERNAL_ERROR};
use crate::websocket::ConnectionScope;

/// Longest close reason allowed in a close frame, in bytes.
const MAX_CLOSE_REASON: usize = 123;

/// Which errors an exception handler is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKey {
    /// `HandlerError::WebSocket` with this close code.
    Code(u16),
    /// Any handler error not claimed by a more specific key.
    Any,
}

/// Lets an exception handler answer the client.
#[derive(Debug, Clone)]
pub struct ErrorResponder {
    send: OutboundTx,
}

impl ErrorResponder {
    pub fn new(send: OutboundTx) -> Self {
        Self { send }
    }

    /// Close the connection. Fails if the transport is gone.
    pub async fn close(&self, code: u16, reason: &str) -> Result<(), HandlerError> {
        self.send
            .send(Outbound::Close {
                code,
                reason: truncate_reason(reason).to_string(),
            })
            .await
            .map_err(|_| HandlerError::Disconnected { code })
    }
}

pub type ExceptionHandler =
    Arc<dyn Fn(ConnectionScope, HandlerError, ErrorResponder) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>;

/// Wrap an async closure as an [`ExceptionHandler`].
pub fn exception_handler<F, Fut>(f: F) -> ExceptionHandler
where
    F: Fn(ConnectionScope, HandlerError, ErrorResponder) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(move |scope: ConnectionScope, error: HandlerError, responder: ErrorResponder| {
        f(scope, error, responder).boxed()
    })
}

pub(crate) struct ExceptionMiddleware {
    next: Arc<dyn Application>,
    handlers: HashMap<ExceptionKey, ExceptionHandler>,
}

impl ExceptionMiddleware {
    pub(crate) fn new(next: Arc<dyn Application>, handlers: HashMap<ExceptionKey, ExceptionHandler>) -> Self {
        Self { next, handlers }
    }

    fn lookup(&self, error: &HandlerError) -> Option<&ExceptionHandler> {
        let by_code = match error {
            HandlerError::WebSocket { code, .. } => self.handlers.get(&ExceptionKey::Code(*code)),
            _ => None,
        };
        by_code.or_else(|| self.handlers.get(&ExceptionKey::Any))
    }

    async fn handle(&self, scope: ConnectionScope, error: HandlerError, send: OutboundTx) -> Result<(), AppError> {
        if let HandlerError::Disconnected { code } = error {
            tracing::debug!(path = %scope.path, code, "Client disconnected");
            return Ok(());
        }

        let responder = ErrorResponder::new(send);
        if let Some(handler) = self.lookup(&error) {
            return Ok(handler(scope, error, responder).await?);
        }

        match error {
            HandlerError::WebSocket { code, reason } => {
                // The socket may already be gone; nothing more to do then.
                let _ = responder.close(code, &reason).await;
                Ok(())
            }
            other => Err(other.into()),
        }
    }
}

impl Application for ExceptionMiddleware {
    fn call(self: Arc<Self>, scope: ConnectionScope, receive: InboundRx, send: OutboundTx) -> AppFuture {
        Box::pin(async move {
            if !scope.is_websocket() {
                return self.next.clone().call(scope, receive, send).await;
            }

            let error_scope = scope.clone();
            let error_send = send.clone();
            match self.next.clone().call(scope, receive, send).await {
                Err(AppError::Handler(error)) => self.handle(error_scope, error, error_send).await,
                other => other,
            }
        })
    }
}

pub(crate) struct ServerErrorMiddleware {
    next: Arc<dyn Application>,
    debug: bool,
}

impl ServerErrorMiddleware {
    pub(crate) fn new(next: Arc<dyn Application>, debug: bool) -> Self {
        Self { next, debug }
    }
}

impl Application for ServerErrorMiddleware {
    fn call(self: Arc<Self>, scope: ConnectionScope, receive: InboundRx, send: OutboundTx) -> AppFuture {
        Box::pin(async move {
            if !scope.is_websocket() {
                return self.next.clone().call(scope, receive, send).await;
            }

            let path = scope.path.clone();
            let error_send = send.clone();
            let result = self.next.clone().call(scope, receive, send).await;
            if let Err(err) = &result {
                tracing::error!(path = %path, error = %err, "Unhandled error in connection handler");
                let reason = if self.debug { err.to_string() } else { String::new() };
                let _ = error_send
                    .send(Outbound::Close {
                        code: CLOSE_INTERNAL_ERROR,
                        reason: truncate_reason(&reason).to_string(),
                    })
                    .await;
            }
            result
        })
    }
}

fn truncate_reason(reason: &str) -> &str {
    if reason.len() <= MAX_CLOSE_REASON {
        return reason;
    }
    let mut end = MAX_CLOSE_REASON;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    &reason[..end]
}
