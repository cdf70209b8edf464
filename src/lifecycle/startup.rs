//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the process-wide lifespan scope on the application
//! - Send `Startup` and wait for the application's answer
//! - Keep the scope open until shutdown, then send `Shutdown`
//!
//! # Design Decisions
//! - Fail fast: a failed startup is fatal
//! - Listeners start only after startup completed (traffic only when ready)

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::app::GBuilder;
use crate::error::AppError;
use crate::websocket::message::{channel, Inbound, InboundTx, Outbound, OutboundRx};
use crate::websocket::ConnectionScope;

/// Drives the lifespan protocol from the hosting side.
#[derive(Debug)]
pub struct LifespanDriver {
    inbound: InboundTx,
    outbound: OutboundRx,
    task: JoinHandle<Result<(), AppError>>,
}

impl LifespanDriver {
    /// Spawn the lifespan scope and run startup.
    pub async fn startup(app: Arc<GBuilder>) -> Result<Self, AppError> {
        let ((inbound, inbound_rx), (outbound_tx, outbound)) = channel(4);
        let task = tokio::spawn(async move {
            app.handle_connection(ConnectionScope::lifespan(), inbound_rx, outbound_tx)
                .await
        });
        let mut driver = Self {
            inbound,
            outbound,
            task,
        };

        driver.send(Inbound::Startup).await?;
        match driver.outbound.recv().await {
            Some(Outbound::StartupComplete) => {
                tracing::debug!("Lifespan startup acknowledged");
                Ok(driver)
            }
            Some(Outbound::StartupFailed { message }) => Err(AppError::Lifespan(message)),
            Some(other) => Err(AppError::Lifespan(format!(
                "unexpected lifespan reply during startup: {other:?}"
            ))),
            None => Err(AppError::Lifespan(
                "application exited before completing startup".into(),
            )),
        }
    }

    /// Run shutdown and wait for the lifespan scope to finish.
    pub async fn shutdown(mut self) -> Result<(), AppError> {
        self.send(Inbound::Shutdown).await?;
        let reply = self.outbound.recv().await;
        drop(self.inbound);

        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Lifespan task panicked");
        }

        match reply {
            Some(Outbound::ShutdownComplete) => Ok(()),
            Some(Outbound::ShutdownFailed { message }) => Err(AppError::Lifespan(message)),
            Some(other) => Err(AppError::Lifespan(format!(
                "unexpected lifespan reply during shutdown: {other:?}"
            ))),
            None => Err(AppError::Lifespan(
                "application exited before completing shutdown".into(),
            )),
        }
    }

    async fn send(&self, event: Inbound) -> Result<(), AppError> {
        self.inbound
            .send(event)
            .await
            .map_err(|_| AppError::Lifespan("lifespan scope is no longer running".into()))
    }
}
