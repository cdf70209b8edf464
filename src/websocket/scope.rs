//! Connection scope.
//!
//! The scope describes one incoming connection. The transport fills in the
//! protocol metadata; the router only adds the matched route name and path
//! parameters before the handler sees it.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::app::State;
use crate::routing::{PathParams, Router};
use crate::websocket::connection::{ConnectionGuard, ConnectionPhase};

/// Protocol type of a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeType {
    WebSocket,
    Lifespan,
    /// Anything else. The application refuses to serve these.
    Other(String),
}

impl ScopeType {
    pub fn as_str(&self) -> &str {
        match self {
            ScopeType::WebSocket => "websocket",
            ScopeType::Lifespan => "lifespan",
            ScopeType::Other(kind) => kind,
        }
    }
}

impl From<&str> for ScopeType {
    fn from(kind: &str) -> Self {
        match kind {
            "websocket" => ScopeType::WebSocket,
            "lifespan" => ScopeType::Lifespan,
            other => ScopeType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for one connection.
#[derive(Debug, Clone)]
pub struct ConnectionScope {
    pub scope_type: ScopeType,
    pub path: String,
    pub query_string: String,
    /// `ws` or `wss`.
    pub scheme: String,
    /// Header pairs with lowercase names, in arrival order.
    pub headers: Vec<(String, String)>,
    /// Subprotocols requested by the client.
    pub subprotocols: Vec<String>,
    pub client: Option<SocketAddr>,
    pub server: Option<SocketAddr>,
    /// Parameters captured by the matched route.
    pub path_params: PathParams,
    /// Name of the matched route, if it has one.
    pub route_name: Option<String>,
    /// Application state, attached by the shell.
    pub state: Option<Arc<State>>,
    /// Route table that served the connection, for reverse lookups.
    pub router: Option<Arc<Router>>,
    /// Lifecycle tracking, attached by the shell for websocket scopes.
    pub connection: Option<Arc<ConnectionGuard>>,
}

impl ConnectionScope {
    pub fn new(scope_type: ScopeType, path: impl Into<String>) -> Self {
        Self {
            scope_type,
            path: path.into(),
            query_string: String::new(),
            scheme: "ws".to_string(),
            headers: Vec::new(),
            subprotocols: Vec::new(),
            client: None,
            server: None,
            path_params: PathParams::new(),
            route_name: None,
            state: None,
            router: None,
            connection: None,
        }
    }

    /// A websocket scope for `path`.
    pub fn websocket(path: impl Into<String>) -> Self {
        Self::new(ScopeType::WebSocket, path)
    }

    /// The process-wide lifespan scope.
    pub fn lifespan() -> Self {
        Self::new(ScopeType::Lifespan, "")
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query_string = query.into();
        self
    }

    pub fn with_subprotocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subprotocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// First header value for `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_websocket(&self) -> bool {
        self.scope_type == ScopeType::WebSocket
    }

    /// Record a lifecycle transition when the scope is tracked.
    pub fn advance(&self, phase: ConnectionPhase) {
        if let Some(connection) = &self.connection {
            connection.advance(phase);
        }
    }
}
