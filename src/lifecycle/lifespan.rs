//! Lifespan protocol.
//!
//! # Responsibilities
//! - Hold startup/shutdown hooks or a single lifespan handler
//! - Reject configurations that supply both
//! - Answer `Startup`/`Shutdown` events on a lifespan scope
//!
//! # Design Decisions
//! - Hooks run sequentially in registration order; the first error stops the phase
//! - Failures are reported through the protocol and also returned to the caller

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::app::State;
use crate::error::{AppError, HandlerError};
use crate::websocket::message::{Inbound, InboundRx, Outbound, OutboundTx};
use crate::websocket::ConnectionScope;

pub type HookFuture = BoxFuture<'static, Result<(), HandlerError>>;

/// A startup or shutdown hook.
pub type Hook = Arc<dyn Fn(Arc<State>) -> HookFuture + Send + Sync>;

/// Wrap an async closure as a [`Hook`].
pub fn hook<F, Fut>(f: F) -> Hook
where
    F: Fn(Arc<State>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(move |state: Arc<State>| f(state).boxed())
}

/// Application-wide setup and teardown as one object.
pub trait LifespanHandler: Send + Sync + 'static {
    fn startup(&self, state: Arc<State>) -> HookFuture;
    fn shutdown(&self, state: Arc<State>) -> HookFuture;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifespanEvent {
    Startup,
    Shutdown,
}

const CONFLICT: &str = "use either lifespan or startup/shutdown hooks, not both";

/// Lifespan configuration of an application.
#[derive(Clone, Default)]
pub struct Lifespan {
    on_startup: Vec<Hook>,
    on_shutdown: Vec<Hook>,
    handler: Option<Arc<dyn LifespanHandler>>,
    debug: bool,
}

impl Lifespan {
    pub fn new(
        on_startup: Vec<Hook>,
        on_shutdown: Vec<Hook>,
        handler: Option<Arc<dyn LifespanHandler>>,
    ) -> Result<Self, AppError> {
        if handler.is_some() && !(on_startup.is_empty() && on_shutdown.is_empty()) {
            return Err(AppError::Configuration(CONFLICT.into()));
        }
        Ok(Self {
            on_startup,
            on_shutdown,
            handler,
            debug: false,
        })
    }

    /// Register a hook for `event`.
    pub fn add_hook(&mut self, event: LifespanEvent, hook: Hook) -> Result<(), AppError> {
        if self.handler.is_some() {
            return Err(AppError::Configuration(CONFLICT.into()));
        }
        match event {
            LifespanEvent::Startup => self.on_startup.push(hook),
            LifespanEvent::Shutdown => self.on_shutdown.push(hook),
        }
        Ok(())
    }

    /// Include error text in `StartupFailed`/`ShutdownFailed` messages.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub async fn startup(&self, state: Arc<State>) -> Result<(), HandlerError> {
        match &self.handler {
            Some(handler) => handler.startup(state).await,
            None => run_hooks(&self.on_startup, state).await,
        }
    }

    pub async fn shutdown(&self, state: Arc<State>) -> Result<(), HandlerError> {
        match &self.handler {
            Some(handler) => handler.shutdown(state).await,
            None => run_hooks(&self.on_shutdown, state).await,
        }
    }
}

impl fmt::Debug for Lifespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifespan")
            .field("on_startup", &self.on_startup.len())
            .field("on_shutdown", &self.on_shutdown.len())
            .field("handler", &self.handler.is_some())
            .field("debug", &self.debug)
            .finish()
    }
}

async fn run_hooks(hooks: &[Hook], state: Arc<State>) -> Result<(), HandlerError> {
    for hook in hooks {
        hook(state.clone()).await?;
    }
    Ok(())
}

fn failure_message(lifespan: &Lifespan, phase: &str, err: &HandlerError) -> String {
    if lifespan.debug {
        format!("{phase} failed: {err}")
    } else {
        format!("{phase} failed")
    }
}

async fn reply(send: &OutboundTx, message: Outbound) -> Result<(), AppError> {
    send.send(message)
        .await
        .map_err(|_| AppError::Transport("lifespan channel closed".into()))
}

/// Serve the lifespan protocol until shutdown completes or the transport
/// goes away.
pub async fn run(
    lifespan: &Lifespan,
    scope: ConnectionScope,
    mut receive: InboundRx,
    send: OutboundTx,
) -> Result<(), AppError> {
    let state = scope.state.clone().unwrap_or_default();

    while let Some(event) = receive.recv().await {
        match event {
            Inbound::Startup => {
                if let Err(err) = lifespan.startup(state.clone()).await {
                    tracing::error!(error = %err, "Application startup failed");
                    let message = failure_message(lifespan, "startup", &err);
                    reply(&send, Outbound::StartupFailed { message }).await?;
                    return Err(AppError::Lifespan(format!("startup failed: {err}")));
                }
                tracing::info!("Application startup complete");
                reply(&send, Outbound::StartupComplete).await?;
            }
            Inbound::Shutdown => {
                if let Err(err) = lifespan.shutdown(state.clone()).await {
                    tracing::error!(error = %err, "Application shutdown failed");
                    let message = failure_message(lifespan, "shutdown", &err);
                    reply(&send, Outbound::ShutdownFailed { message }).await?;
                    return Err(AppError::Lifespan(format!("shutdown failed: {err}")));
                }
                tracing::info!("Application shutdown complete");
                reply(&send, Outbound::ShutdownComplete).await?;
                return Ok(());
            }
            other => tracing::warn!(event = ?other, "Ignoring non-lifespan event on lifespan scope"),
        }
    }

    tracing::debug!("Lifespan channel closed before shutdown");
    Ok(())
}
