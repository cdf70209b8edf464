//! Routes: a path pattern bound to a handler.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::error::{AppError, HandlerError};
use crate::routing::matcher::{Match, Matcher};
use crate::routing::params::PathParams;
use crate::routing::pattern::PathPattern;
use crate::websocket::message::{InboundRx, Outbound, OutboundTx, CLOSE_NORMAL};
use crate::websocket::{ConnectionPhase, ConnectionScope, ScopeType, WebSocket};

pub type HandlerFuture = BoxFuture<'static, Result<(), HandlerError>>;

/// A connection handler.
///
/// Implemented for every `Fn(WebSocket) -> impl Future<Output = Result<(), HandlerError>>`,
/// so plain `async fn` items can be registered directly.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, websocket: WebSocket) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(WebSocket) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn call(&self, websocket: WebSocket) -> HandlerFuture {
        (self)(websocket).boxed()
    }
}

/// One registered endpoint.
#[derive(Clone)]
pub struct Route {
    pattern: PathPattern,
    handler: Arc<dyn Handler>,
    name: Option<String>,
    scope_type: ScopeType,
}

impl Route {
    /// A websocket route.
    pub fn websocket<H: Handler>(path: &str, handler: H, name: Option<&str>) -> Result<Self, AppError> {
        Ok(Self {
            pattern: PathPattern::compile(path)?,
            handler: Arc::new(handler),
            name: name.map(str::to_owned),
            scope_type: ScopeType::WebSocket,
        })
    }

    /// Declare the connection type this route serves.
    ///
    /// Routes declaring anything other than `websocket` only ever produce
    /// partial matches for websocket connections.
    pub fn with_scope_type(mut self, scope_type: ScopeType) -> Self {
        self.scope_type = scope_type;
        self
    }

    pub fn path(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn scope_type(&self) -> &ScopeType {
        &self.scope_type
    }

    /// Run the handler for an already matched scope.
    pub async fn handle(
        &self,
        scope: ConnectionScope,
        receive: InboundRx,
        send: OutboundTx,
    ) -> Result<(), HandlerError> {
        scope.advance(ConnectionPhase::HandlerRunning);
        self.handler.call(WebSocket::new(scope, receive, send)).await
    }

    /// Use the route on its own, without a router.
    ///
    /// A websocket scope that does not match is closed; a lifespan scope is
    /// ignored.
    pub async fn call(
        &self,
        mut scope: ConnectionScope,
        receive: InboundRx,
        send: OutboundTx,
    ) -> Result<(), AppError> {
        match self.matches(&scope) {
            Match::None => {
                if scope.is_websocket() {
                    scope.advance(ConnectionPhase::Rejected);
                    send.send(Outbound::close(CLOSE_NORMAL))
                        .await
                        .map_err(|_| AppError::Transport("outbound channel closed".into()))?;
                }
                Ok(())
            }
            Match::Partial(params) | Match::Full(params) => {
                scope.path_params.merge(params);
                scope.route_name = self.name.clone();
                scope.advance(ConnectionPhase::Matched);
                self.handle(scope, receive, send).await?;
                Ok(())
            }
        }
    }

    /// Reverse this route's path.
    pub(crate) fn reverse(&self, params: &PathParams) -> Option<String> {
        self.pattern.reverse(params)
    }
}

impl Matcher for Route {
    fn matches(&self, scope: &ConnectionScope) -> Match {
        if scope.scope_type == ScopeType::Lifespan {
            return Match::None;
        }
        match self.pattern.match_path(&scope.path) {
            Some(params) if scope.scope_type == self.scope_type => Match::Full(params),
            Some(params) => Match::Partial(params),
            None => Match::None,
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.pattern.as_str())
            .field("name", &self.name)
            .field("scope_type", &self.scope_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::params::ParamValue;
    use crate::websocket::message::{channel, Inbound};

    async fn noop(_ws: WebSocket) -> Result<(), HandlerError> {
        Ok(())
    }

    #[test]
    fn websocket_scope_on_matching_path_is_full() {
        let route = Route::websocket("/items/{id:int}", noop, None).unwrap();
        let result = route.matches(&ConnectionScope::websocket("/items/3"));
        assert_eq!(result, Match::Full(PathParams::new().with("id", 3u64)));
        assert!(route.matches(&ConnectionScope::websocket("/other")).is_none());
    }

    #[test]
    fn declared_type_mismatch_is_partial() {
        let route = Route::websocket("/feed", noop, None)
            .unwrap()
            .with_scope_type(ScopeType::from("http"));
        assert_eq!(
            route.matches(&ConnectionScope::websocket("/feed")),
            Match::Partial(PathParams::new())
        );
    }

    #[test]
    fn lifespan_never_matches() {
        let route = Route::websocket("/", noop, None).unwrap();
        assert!(route.matches(&ConnectionScope::lifespan()).is_none());
    }

    #[tokio::test]
    async fn standalone_route_closes_unmatched_websocket() {
        let route = Route::websocket("/x", noop, None).unwrap();
        let ((_in_tx, in_rx), (out_tx, mut out_rx)) = channel(4);

        route.call(ConnectionScope::websocket("/y"), in_rx, out_tx).await.unwrap();

        assert_eq!(out_rx.recv().await, Some(Outbound::close(CLOSE_NORMAL)));
    }

    #[tokio::test]
    async fn standalone_route_passes_params_to_handler() {
        let route = Route::websocket(
            "/echo/{word}",
            |mut ws: WebSocket| async move {
                let word = ws.path_param("word").and_then(ParamValue::as_str).unwrap().to_owned();
                ws.accept(None).await?;
                ws.send_text(word).await
            },
            Some("echo"),
        )
        .unwrap();
        let ((in_tx, in_rx), (out_tx, mut out_rx)) = channel(4);
        in_tx.send(Inbound::Connect).await.unwrap();

        route.call(ConnectionScope::websocket("/echo/hello"), in_rx, out_tx).await.unwrap();

        assert!(matches!(out_rx.recv().await, Some(Outbound::Accept { .. })));
        assert_eq!(
            out_rx.recv().await,
            Some(Outbound::Send(crate::websocket::Frame::Text("hello".into())))
        );
    }
}
