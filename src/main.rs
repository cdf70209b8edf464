//! gbuilder server.
//!
//! Serves an echo endpoint at `/` on top of the framework:
//!
//! ```text
//! client ──upgrade──▶ http (axum) ──scope──▶ GBuilder ──dispatch──▶ echo handler
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use gbuilder::app::middleware::AllowedOrigins;
use gbuilder::config::{load_config, AppConfig};
use gbuilder::lifecycle::lifespan::hook;
use gbuilder::lifecycle::signals::shutdown_signal;
use gbuilder::observability::{init_logging, init_metrics};
use gbuilder::{Frame, GBuilder, HandlerError, HttpServer, LifespanEvent, Shutdown, WebSocket};

#[derive(Parser)]
#[command(name = "gbuilder")]
#[command(about = "WebSocket application server", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Expose error details to clients.
    #[arg(long)]
    debug: bool,
}

/// Send every frame back to the client.
async fn echo(mut ws: WebSocket) -> Result<(), HandlerError> {
    ws.accept(None).await?;
    loop {
        match ws.receive_frame().await {
            Ok(Frame::Text(text)) => ws.send_text(text).await?,
            Ok(Frame::Binary(data)) => ws.send_bytes(data).await?,
            Err(HandlerError::Disconnected { .. }) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    config.app.debug |= cli.debug;

    init_logging(&config.observability);
    tracing::info!("gbuilder v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        debug = config.app.debug,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut app = GBuilder::builder()
        .debug(config.app.debug)
        .middleware(AllowedOrigins::new(config.app.allowed_origins.clone()))
        .build()?;
    app.route("/", Some("echo"))(echo)?;
    app.add_event_handler(
        LifespanEvent::Startup,
        hook(|state| async move {
            state.insert("started_at", std::time::SystemTime::now());
            Ok(())
        }),
    )?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    HttpServer::new(app, config).run(listener, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
