//! Error types shared across the framework.
//!
//! # Design Decisions
//! - `AppError` covers integrator misuse (configuration, protocol) and
//!   reverse-lookup failures; these always propagate to the caller
//! - `HandlerError` is what user handlers return; the exception layer decides
//!   whether it becomes a close frame, a registered handler call, or a log line
//! - A dispatch rejection is not an error

use thiserror::Error;

/// Errors raised by the application shell, the router and the lifespan driver.
#[derive(Debug, Error)]
pub enum AppError {
    /// Conflicting or late configuration. Never recovered.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The application was invoked with an unsupported scope type.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// No route is registered under the requested name.
    #[error("no route named '{name}'")]
    RouteNotFound { name: String },

    /// Routes with this name exist but none accepts the supplied parameters.
    #[error("parameters {supplied:?} do not satisfy route '{name}' (expected {expected:?})")]
    ParameterMismatch {
        name: String,
        expected: Vec<String>,
        supplied: Vec<String>,
    },

    /// Startup or shutdown reported failure through the lifespan protocol.
    #[error("lifespan failure: {0}")]
    Lifespan(String),

    /// The transport side of a channel went away.
    #[error("transport closed: {0}")]
    Transport(String),

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Errors produced while a connection handler (or lifespan hook) runs.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Close the connection with the given code and reason.
    #[error("websocket error {code}: {reason}")]
    WebSocket { code: u16, reason: String },

    /// The peer went away.
    #[error("websocket disconnected with code {code}")]
    Disconnected { code: u16 },

    /// The connection object was used out of order.
    #[error("{0}")]
    Runtime(String),

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Build an error that closes the socket with `code`.
    pub fn websocket(code: u16, reason: impl Into<String>) -> Self {
        HandlerError::WebSocket {
            code,
            reason: reason.into(),
        }
    }

    /// Wrap any error raised by user code.
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        HandlerError::Other(Box::new(error))
    }

    /// Close code carried by this error, if any.
    pub fn close_code(&self) -> Option<u16> {
        match self {
            HandlerError::WebSocket { code, .. } | HandlerError::Disconnected { code } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_error_converts_into_app_error() {
        let err: AppError = HandlerError::websocket(1008, "policy").into();
        assert!(matches!(err, AppError::Handler(HandlerError::WebSocket { code: 1008, .. })));
        assert_eq!(err.to_string(), "websocket error 1008: policy");
    }

    #[test]
    fn close_code_only_for_socket_errors() {
        assert_eq!(HandlerError::Disconnected { code: 1001 }.close_code(), Some(1001));
        assert_eq!(HandlerError::Runtime("boom".into()).close_code(), None);
    }
}
