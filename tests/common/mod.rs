//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use gbuilder::config::AppConfig;
use gbuilder::http::ServerError;
use gbuilder::{Frame, GBuilder, HandlerError, HttpServer, Shutdown, WebSocket};

/// A server bound to an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Signal shutdown and wait for the server to stop.
    pub async fn stop(self) -> Result<(), ServerError> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.listener.shutdown_grace_secs = 2;
    config
}

pub async fn start_server(app: GBuilder) -> TestServer {
    start_server_with(app, test_config()).await
}

pub async fn start_server_with(app: GBuilder, config: AppConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    let handle = tokio::spawn(HttpServer::new(app, config).run(listener, shutdown_rx));
    wait_until_listening(addr).await;
    TestServer { addr, shutdown, handle }
}

async fn wait_until_listening(addr: SocketAddr) {
    for _ in 0..50 {
        if TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server at {addr} never became reachable");
}

/// Send a raw HTTP/1.1 request and return the status code.
pub async fn raw_status(addr: SocketAddr, request: &str) -> u16 {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut buf = vec![0u8; 1024];
    let n = stream.read(&mut buf).await.unwrap();
    let head = String::from_utf8_lossy(&buf[..n]);
    head.split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("malformed status line")
}

/// Send every frame back to the client.
pub async fn echo(mut ws: WebSocket) -> Result<(), HandlerError> {
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
