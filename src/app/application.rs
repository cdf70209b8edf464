//! The application shell.
//!
//! `GBuilder` owns the route table, the application state and the middleware
//! configuration, and is the single entry point a transport calls for every
//! connection and for the process-wide lifespan scope.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tracing::Instrument;

use crate::app::builder::AppBuilder;
use crate::app::exceptions::{ExceptionHandler, ExceptionKey, ExceptionMiddleware, ServerErrorMiddleware};
use crate::app::middleware::Middleware;
use crate::app::state::State;
use crate::app::{AppFuture, Application};
use crate::error::AppError;
use crate::lifecycle::lifespan::{Hook, LifespanEvent};
use crate::routing::{Handler, PathParams, Route, Router, UrlPath};
use crate::websocket::message::{InboundRx, OutboundTx};
use crate::websocket::{ConnectionPhase, ConnectionScope, ConnectionTracker};

const STARTED: &str = "cannot modify the application after it has started serving";

pub struct GBuilder {
    debug: bool,
    state: Arc<State>,
    router: Arc<Router>,
    exception_handlers: HashMap<ExceptionKey, ExceptionHandler>,
    user_middleware: Vec<Arc<dyn Middleware>>,
    middleware_stack: OnceLock<Arc<dyn Application>>,
    tracker: ConnectionTracker,
}

impl GBuilder {
    pub fn new() -> Self {
        Self::from_parts(false, Router::default(), Vec::new(), HashMap::new())
    }

    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    pub(crate) fn from_parts(
        debug: bool,
        mut router: Router,
        user_middleware: Vec<Arc<dyn Middleware>>,
        exception_handlers: HashMap<ExceptionKey, ExceptionHandler>,
    ) -> Self {
        router.lifespan_mut().set_debug(debug);
        Self {
            debug,
            state: Arc::new(State::new()),
            router: Arc::new(router),
            exception_handlers,
            user_middleware,
            middleware_stack: OnceLock::new(),
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Application-wide state shared with every handler and lifespan hook.
    pub fn state(&self) -> Arc<State> {
        self.state.clone()
    }

    pub fn routes(&self) -> &[Route] {
        self.router.routes()
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Whether the middleware stack has been built.
    pub fn is_started(&self) -> bool {
        self.middleware_stack.get().is_some()
    }

    fn ensure_not_started(&self) -> Result<(), AppError> {
        if self.is_started() {
            return Err(AppError::Configuration(STARTED.into()));
        }
        Ok(())
    }

    fn router_mut(&mut self) -> Result<&mut Router, AppError> {
        self.ensure_not_started()?;
        Arc::get_mut(&mut self.router).ok_or_else(|| AppError::Configuration(STARTED.into()))
    }

    /// Register a route. Every route in this shell serves websocket
    /// connections, so this is the same as [`GBuilder::add_websocket_route`].
    pub fn add_route<H: Handler>(&mut self, path: &str, handler: H, name: Option<&str>) -> Result<(), AppError> {
        self.add_websocket_route(path, handler, name)
    }

    pub fn add_websocket_route<H: Handler>(
        &mut self,
        path: &str,
        handler: H,
        name: Option<&str>,
    ) -> Result<(), AppError> {
        self.router_mut()?.add_websocket_route(path, handler, name)
    }

    /// Decorator form of [`GBuilder::add_route`]: registers the handler and
    /// hands it back.
    ///
    /// ```ignore
    /// let echo = app.route("/", Some("echo"))(echo)?;
    /// ```
    pub fn route<'a, H>(
        &'a mut self,
        path: &'a str,
        name: Option<&'a str>,
    ) -> impl FnOnce(H) -> Result<H, AppError> + 'a
    where
        H: Handler + Clone,
    {
        move |handler: H| {
            self.add_route(path, handler.clone(), name)?;
            Ok(handler)
        }
    }

    pub fn websocket_route<'a, H>(
        &'a mut self,
        path: &'a str,
        name: Option<&'a str>,
    ) -> impl FnOnce(H) -> Result<H, AppError> + 'a
    where
        H: Handler + Clone,
    {
        move |handler: H| {
            self.add_websocket_route(path, handler.clone(), name)?;
            Ok(handler)
        }
    }

    /// Add middleware. The first one added sees each connection first.
    pub fn add_middleware<M: Middleware>(&mut self, middleware: M) -> Result<(), AppError> {
        self.ensure_not_started()?;
        self.user_middleware.push(Arc::new(middleware));
        Ok(())
    }

    pub fn add_exception_handler(&mut self, key: ExceptionKey, handler: ExceptionHandler) -> Result<(), AppError> {
        self.ensure_not_started()?;
        self.exception_handlers.insert(key, handler);
        Ok(())
    }

    /// Register a startup or shutdown hook.
    ///
    /// Fails when the application was built with a lifespan handler.
    pub fn add_event_handler(&mut self, event: LifespanEvent, hook: Hook) -> Result<(), AppError> {
        self.router_mut()?.lifespan_mut().add_hook(event, hook)
    }

    pub fn url_path_for(&self, name: &str, params: &PathParams) -> Result<UrlPath, AppError> {
        self.router.url_path_for(name, params)
    }

    fn middleware_stack(&self) -> Arc<dyn Application> {
        self.middleware_stack
            .get_or_init(|| {
                let mut app: Arc<dyn Application> =
                    Arc::new(ExceptionMiddleware::new(self.router.clone(), self.exception_handlers.clone()));
                for middleware in self.user_middleware.iter().rev() {
                    app = middleware.wrap(app);
                }
                tracing::debug!(
                    middleware = self.user_middleware.len(),
                    routes = self.router.routes().len(),
                    "Middleware stack built"
                );
                Arc::new(ServerErrorMiddleware::new(app, self.debug))
            })
            .clone()
    }

    /// Serve one connection scope (or the lifespan scope) to completion.
    pub async fn handle_connection(
        &self,
        mut scope: ConnectionScope,
        receive: InboundRx,
        send: OutboundTx,
    ) -> Result<(), AppError> {
        scope.state = Some(self.state.clone());
        if scope.router.is_none() {
            scope.router = Some(self.router.clone());
        }
        if scope.is_websocket() && scope.connection.is_none() {
            scope.connection = Some(Arc::new(self.tracker.track()));
        }

        let connection = scope.connection.clone();
        let span = match &connection {
            Some(connection) => tracing::info_span!(
                "connection",
                connection_id = %connection.id(),
                path = %scope.path,
            ),
            None => tracing::info_span!("scope", scope_type = %scope.scope_type),
        };

        let stack = self.middleware_stack();
        let result = stack.call(scope, receive, send).instrument(span).await;

        if let Some(connection) = connection {
            match &result {
                Ok(()) => connection.advance(ConnectionPhase::Closed),
                Err(_) => connection.advance(ConnectionPhase::Errored),
            }
        }
        result
    }
}

impl Default for GBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GBuilder")
            .field("debug", &self.debug)
            .field("routes", &self.router.routes().len())
            .field("middleware", &self.user_middleware.len())
            .field("exception_handlers", &self.exception_handlers.len())
            .field("started", &self.is_started())
            .finish()
    }
}

impl Application for GBuilder {
    fn call(self: Arc<Self>, scope: ConnectionScope, receive: InboundRx, send: OutboundTx) -> AppFuture {
        Box::pin(async move { self.handle_connection(scope, receive, send).await })
    }
}
