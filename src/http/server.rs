//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Run lifespan startup before accepting traffic
//! - Create the Axum router that offers every path to the application
//! - Wire up middleware (tracing, request ID)
//! - Serve plain TCP or TLS until shutdown is signalled
//! - Close live sockets, drain them within the grace period, then run
//!   lifespan shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::app::GBuilder;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::http::tls::load_tls_config;
use crate::http::upgrade::{upgrade_handler, UpgradeState};
use crate::lifecycle::{LifespanDriver, Shutdown};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    App(#[from] AppError),
}

/// Hosts a [`GBuilder`] over HTTP upgrades.
pub struct HttpServer {
    app: Arc<GBuilder>,
    config: AppConfig,
}

impl HttpServer {
    pub fn new(app: GBuilder, config: AppConfig) -> Self {
        Self {
            app: Arc::new(app),
            config,
        }
    }

    pub fn app(&self) -> &Arc<GBuilder> {
        &self.app
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: UpgradeState) -> Router {
        Router::new().fallback(upgrade_handler).with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
    }

    /// Run the server on `listener` until `shutdown_rx` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown_rx: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;

        let tls = match &self.config.listener.tls {
            Some(config) => Some(load_tls_config(config).await?),
            None => None,
        };

        let lifespan = LifespanDriver::startup(self.app.clone()).await?;

        let sockets = Shutdown::new();
        let state = UpgradeState {
            app: self.app.clone(),
            shutdown: sockets.clone(),
            local_addr: addr,
            secure: tls.is_some(),
            channel_capacity: self.config.app.channel_capacity,
            max_connections: self.config.listener.max_connections,
        };
        let service = Self::build_router(state).into_make_service_with_connect_info::<SocketAddr>();
        let grace = Duration::from_secs(self.config.listener.shutdown_grace_secs);

        let stop = {
            let sockets = sockets.clone();
            async move {
                let _ = shutdown_rx.recv().await;
                tracing::info!("Stopping listener, closing open connections");
                sockets.trigger();
            }
        };

        tracing::info!(address = %addr, tls = tls.is_some(), "HTTP server starting");
        let served = match tls {
            None => axum::serve(listener, service).with_graceful_shutdown(stop).await,
            Some(tls) => {
                let handle = axum_server::Handle::new();
                let shutdown_handle = handle.clone();
                tokio::spawn(async move {
                    stop.await;
                    shutdown_handle.graceful_shutdown(Some(grace));
                });
                axum_server::from_tcp_rustls(listener.into_std()?, tls)
                    .handle(handle)
                    .serve(service)
                    .await
            }
        };
        // Make sure sockets are told to close even if serving ended on an error.
        sockets.trigger();

        if tokio::time::timeout(grace, self.app.tracker().wait_for_shutdown())
            .await
            .is_err()
        {
            tracing::warn!(
                open = self.app.active_connections(),
                grace_secs = grace.as_secs(),
                "Grace period elapsed with connections still open"
            );
        }

        let stopped = lifespan.shutdown().await;
        served?;
        stopped?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
