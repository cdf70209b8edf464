//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Refuse scopes that are neither `websocket` nor `lifespan`
//! - Hand lifespan scopes to the lifespan protocol
//! - Select at most one route per connection
//! - Close unmatched websocket connections during the handshake
//! - Reverse lookup by route name
//!
//! # Design Decisions
//! - One synchronous pass over the routes; never suspends
//! - First `Full` match wins; the first `Partial` is the fallback
//! - Explicit `Reject` rather than silent drop

use std::sync::Arc;

use crate::app::{AppFuture, Application};
use crate::error::AppError;
use crate::lifecycle::lifespan::{self, Lifespan};
use crate::observability::metrics;
use crate::routing::matcher::{Match, Matcher};
use crate::routing::params::PathParams;
use crate::routing::route::{Handler, Route};
use crate::routing::url::UrlPath;
use crate::websocket::message::{InboundRx, Outbound, OutboundTx, CLOSE_NORMAL};
use crate::websocket::{ConnectionPhase, ConnectionScope, ScopeType};

/// Result of dispatching one scope.
#[derive(Debug)]
pub enum Outcome<'a> {
    /// Run the lifespan protocol.
    Lifespan,
    /// Hand the connection to this route.
    Handle(&'a Route),
    /// Nothing matched.
    Reject,
}

/// Ordered route table plus lifespan configuration.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
    lifespan: Lifespan,
}

impl Router {
    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            routes,
            lifespan: Lifespan::default(),
        }
    }

    pub fn with_lifespan(mut self, lifespan: Lifespan) -> Self {
        self.lifespan = lifespan;
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn lifespan(&self) -> &Lifespan {
        &self.lifespan
    }

    pub fn lifespan_mut(&mut self) -> &mut Lifespan {
        &mut self.lifespan
    }

    /// Append a route. Duplicates are allowed and evaluated in order.
    pub fn push(&mut self, route: Route) {
        self.routes.push(route);
    }

    pub fn add_websocket_route<H: Handler>(
        &mut self,
        path: &str,
        handler: H,
        name: Option<&str>,
    ) -> Result<(), AppError> {
        self.push(Route::websocket(path, handler, name)?);
        Ok(())
    }

    /// Select the route for `scope`, merging matched parameters into it.
    pub fn dispatch(&self, scope: &mut ConnectionScope) -> Result<Outcome<'_>, AppError> {
        match scope.scope_type {
            ScopeType::WebSocket => {}
            ScopeType::Lifespan => {
                metrics::record_dispatch("lifespan");
                return Ok(Outcome::Lifespan);
            }
            ScopeType::Other(ref kind) => {
                return Err(AppError::ProtocolViolation(format!(
                    "the application cannot be used outside of a websocket or lifespan scope (got '{kind}')"
                )));
            }
        }

        let mut partial: Option<(&Route, PathParams)> = None;
        for route in &self.routes {
            match route.matches(scope) {
                Match::Full(params) => {
                    Self::bind(scope, route, params);
                    metrics::record_dispatch("full");
                    tracing::debug!(path = %scope.path, route = route.path(), "Route matched");
                    return Ok(Outcome::Handle(route));
                }
                Match::Partial(params) if partial.is_none() => partial = Some((route, params)),
                Match::Partial(_) | Match::None => {}
            }
        }

        if let Some((route, params)) = partial {
            Self::bind(scope, route, params);
            metrics::record_dispatch("partial");
            tracing::debug!(path = %scope.path, route = route.path(), "Route partially matched");
            return Ok(Outcome::Handle(route));
        }

        metrics::record_dispatch("reject");
        tracing::debug!(path = %scope.path, "No route matched");
        Ok(Outcome::Reject)
    }

    fn bind(scope: &mut ConnectionScope, route: &Route, params: PathParams) {
        scope.path_params.merge(params);
        scope.route_name = route.name().map(str::to_owned);
        scope.advance(ConnectionPhase::Matched);
    }

    /// Close an unmatched websocket before it is accepted.
    pub async fn not_found(scope: &ConnectionScope, send: &OutboundTx) -> Result<(), AppError> {
        scope.advance(ConnectionPhase::Rejected);
        if scope.is_websocket() {
            send.send(Outbound::close(CLOSE_NORMAL))
                .await
                .map_err(|_| AppError::Transport("outbound channel closed".into()))?;
        }
        Ok(())
    }

    /// Dispatch and run the selected route (or the lifespan protocol).
    pub async fn app(
        &self,
        mut scope: ConnectionScope,
        receive: InboundRx,
        send: OutboundTx,
    ) -> Result<(), AppError> {
        match self.dispatch(&mut scope)? {
            Outcome::Lifespan => lifespan::run(&self.lifespan, scope, receive, send).await,
            Outcome::Handle(route) => Ok(route.handle(scope, receive, send).await?),
            Outcome::Reject => Self::not_found(&scope, &send).await,
        }
    }

    /// Reverse lookup by route name.
    pub fn url_path_for(&self, name: &str, params: &PathParams) -> Result<UrlPath, AppError> {
        let mut named = self.routes.iter().filter(|route| route.name() == Some(name)).peekable();
        let Some(first) = named.peek().copied() else {
            return Err(AppError::RouteNotFound { name: name.to_string() });
        };

        if let Some(path) = named.find_map(|route| route.reverse(params)) {
            return Ok(UrlPath::new(path));
        }
        Err(AppError::ParameterMismatch {
            name: name.to_string(),
            expected: first.pattern().param_names().map(str::to_owned).collect(),
            supplied: params.names().map(str::to_owned).collect(),
        })
    }
}

impl Application for Router {
    fn call(self: Arc<Self>, mut scope: ConnectionScope, receive: InboundRx, send: OutboundTx) -> AppFuture {
        Box::pin(async move {
            if scope.router.is_none() {
                scope.router = Some(self.clone());
            }
            self.app(scope, receive, send).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::websocket::message::{channel, Inbound};
    use crate::websocket::{Frame, WebSocket};

    async fn noop(_ws: WebSocket) -> Result<(), HandlerError> {
        Ok(())
    }

    fn route(path: &str, name: &str) -> Route {
        Route::websocket(path, noop, Some(name)).unwrap()
    }

    fn selected<'a>(router: &'a Router, path: &str) -> Option<&'a str> {
        let mut scope = ConnectionScope::websocket(path);
        match router.dispatch(&mut scope).unwrap() {
            Outcome::Handle(route) => route.name(),
            _ => None,
        }
    }

    #[test]
    fn registration_order_breaks_ties() {
        let router = Router::new(vec![route("/a", "a"), route("/a", "b")]);
        assert_eq!(selected(&router, "/a"), Some("a"));
    }

    #[test]
    fn later_full_match_beats_earlier_partial() {
        let router = Router::new(vec![
            route("/feed", "partial").with_scope_type(ScopeType::from("http")),
            route("/feed", "full"),
        ]);
        assert_eq!(selected(&router, "/feed"), Some("full"));
    }

    #[test]
    fn first_partial_is_the_fallback() {
        let router = Router::new(vec![
            route("/feed", "first").with_scope_type(ScopeType::from("http")),
            route("/feed", "second").with_scope_type(ScopeType::from("http")),
            route("/other", "other"),
        ]);
        assert_eq!(selected(&router, "/feed"), Some("first"));
    }

    #[test]
    fn unmatched_and_empty_tables_reject() {
        let router = Router::new(vec![route("/x", "x")]);
        let mut scope = ConnectionScope::websocket("/y");
        assert!(matches!(router.dispatch(&mut scope).unwrap(), Outcome::Reject));

        let empty = Router::default();
        assert!(matches!(empty.dispatch(&mut scope).unwrap(), Outcome::Reject));
    }

    #[test]
    fn http_scope_is_a_protocol_violation() {
        let router = Router::new(vec![route("/x", "x")]);
        let mut scope = ConnectionScope::new(ScopeType::from("http"), "/x");
        assert!(matches!(router.dispatch(&mut scope), Err(AppError::ProtocolViolation(_))));
    }

    #[test]
    fn lifespan_scope_is_delegated() {
        let router = Router::new(vec![route("/x", "x")]);
        let mut scope = ConnectionScope::lifespan();
        assert!(matches!(router.dispatch(&mut scope).unwrap(), Outcome::Lifespan));
    }

    #[test]
    fn matched_params_are_merged_into_scope() {
        let router = Router::new(vec![route("/rooms/{room}", "room")]);
        let mut scope = ConnectionScope::websocket("/rooms/lobby");
        router.dispatch(&mut scope).unwrap();
        assert_eq!(scope.path_params, PathParams::new().with("room", "lobby"));
        assert_eq!(scope.route_name.as_deref(), Some("room"));
    }

    #[test]
    fn url_path_for_resolves_and_reports_errors() {
        let router = Router::new(vec![route("/a", "a"), route("/a", "b"), route("/rooms/{room}", "room")]);
        assert_eq!(router.url_path_for("b", &PathParams::new()).unwrap(), "/a");
        assert_eq!(
            router.url_path_for("room", &PathParams::new().with("room", "lobby")).unwrap(),
            "/rooms/lobby"
        );
        assert!(matches!(
            router.url_path_for("missing", &PathParams::new()),
            Err(AppError::RouteNotFound { .. })
        ));
        assert!(matches!(
            router.url_path_for("room", &PathParams::new()),
            Err(AppError::ParameterMismatch { .. })
        ));
    }

    #[test]
    fn reversed_paths_dispatch_back_to_their_route() {
        let router = Router::new(vec![route("/items/{id:int}", "item"), route("/{rest:path}", "catch")]);
        let path = router.url_path_for("item", &PathParams::new().with("id", 9u64)).unwrap();
        assert_eq!(selected(&router, path.as_str()), Some("item"));
    }

    #[tokio::test]
    async fn app_closes_rejected_websocket() {
        let router = Router::new(vec![route("/x", "x")]);
        let ((_in_tx, in_rx), (out_tx, mut out_rx)) = channel(4);

        router.app(ConnectionScope::websocket("/y"), in_rx, out_tx).await.unwrap();

        assert_eq!(out_rx.recv().await, Some(Outbound::close(CLOSE_NORMAL)));
    }

    #[tokio::test]
    async fn app_runs_the_matched_handler() {
        let router = Router::new(vec![Route::websocket(
            "/echo",
            |mut ws: WebSocket| async move {
                ws.accept(None).await?;
                let text = ws.receive_text().await?;
                ws.send_text(text).await
            },
            None,
        )
        .unwrap()]);
        let ((in_tx, in_rx), (out_tx, mut out_rx)) = channel(4);
        in_tx.send(Inbound::Connect).await.unwrap();
        in_tx.send(Inbound::Receive(Frame::Text("ping".into()))).await.unwrap();

        router.app(ConnectionScope::websocket("/echo"), in_rx, out_tx).await.unwrap();

        assert!(matches!(out_rx.recv().await, Some(Outbound::Accept { .. })));
        assert_eq!(out_rx.recv().await, Some(Outbound::Send(Frame::Text("ping".into()))));
    }
}
