//! One-shot construction of a [`GBuilder`].
//!
//! Route compilation errors are kept until [`AppBuilder::build`] so the
//! builder can be chained without a `?` on every call.

use std::collections::HashMap;
use std::sync::Arc;

use crate::app::application::GBuilder;
use crate::app::exceptions::{ExceptionHandler, ExceptionKey};
use crate::app::middleware::Middleware;
use crate::error::AppError;
use crate::lifecycle::lifespan::{Hook, Lifespan, LifespanHandler};
use crate::routing::{Handler, Route, Router};

#[derive(Default)]
pub struct AppBuilder {
    debug: bool,
    routes: Vec<Route>,
    middleware: Vec<Arc<dyn Middleware>>,
    exception_handlers: HashMap<ExceptionKey, ExceptionHandler>,
    on_startup: Vec<Hook>,
    on_shutdown: Vec<Hook>,
    lifespan: Option<Arc<dyn LifespanHandler>>,
    error: Option<AppError>,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose error text in close reasons and lifespan failure messages.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn route<H: Handler>(mut self, path: &str, handler: H, name: Option<&str>) -> Self {
        match Route::websocket(path, handler, name) {
            Ok(route) => self.routes.push(route),
            Err(err) => {
                self.error.get_or_insert(err);
            }
        }
        self
    }

    /// Append already constructed routes, keeping their order.
    pub fn routes<I: IntoIterator<Item = Route>>(mut self, routes: I) -> Self {
        self.routes.extend(routes);
        self
    }

    pub fn middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn exception_handler(mut self, key: ExceptionKey, handler: ExceptionHandler) -> Self {
        self.exception_handlers.insert(key, handler);
        self
    }

    pub fn on_startup(mut self, hook: Hook) -> Self {
        self.on_startup.push(hook);
        self
    }

    pub fn on_shutdown(mut self, hook: Hook) -> Self {
        self.on_shutdown.push(hook);
        self
    }

    pub fn lifespan<L: LifespanHandler>(mut self, handler: L) -> Self {
        self.lifespan = Some(Arc::new(handler));
        self
    }

    /// Fails on an invalid route pattern or when both hooks and a lifespan
    /// handler were supplied.
    pub fn build(self) -> Result<GBuilder, AppError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let lifespan = Lifespan::new(self.on_startup, self.on_shutdown, self.lifespan)?;
        let router = Router::new(self.routes).with_lifespan(lifespan);
        Ok(GBuilder::from_parts(
            self.debug,
            router,
            self.middleware,
            self.exception_handlers,
        ))
    }
}

impl std::fmt::Debug for AppBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppBuilder")
            .field("debug", &self.debug)
            .field("routes", &self.routes)
            .field("middleware", &self.middleware.len())
            .field("on_startup", &self.on_startup.len())
            .field("on_shutdown", &self.on_shutdown.len())
            .field("lifespan", &self.lifespan.is_some())
            .finish()
    }
}
