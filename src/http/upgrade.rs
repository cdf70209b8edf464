//! WebSocket handshake and frame pump.
//!
//! # Responsibilities
//! - Reject requests that are not websocket upgrades (426) and connections
//!   over capacity (503)
//! - Run the application for the connection and let its first reply decide
//!   the handshake: `Accept` upgrades, `Close` becomes a 403
//! - Pump frames between the socket and the application's channels
//! - Close live sockets with 1001 on server shutdown
//!
//! # Data Flow
//! ```text
//! Client ←── WebSocket frames ──→ pump ←── Inbound/Outbound ──→ GBuilder task
//! ```
//!
//! # Design Decisions
//! - One spawned task runs the application; the pump splits the socket into
//!   a reader task and a writer task
//! - Ping/pong is handled by the websocket implementation, never forwarded

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{CloseFrame, Message, WebSocket as Socket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use crate::app::GBuilder;
use crate::http::request::{request_id, websocket_scope};
use crate::lifecycle::Shutdown;
use crate::websocket::message::{
    channel, Frame, Inbound, InboundTx, Outbound, OutboundRx, CLOSE_ABNORMAL, CLOSE_GOING_AWAY, CLOSE_NORMAL,
};

/// Close code reported when the peer's close frame carried no status.
const CLOSE_NO_STATUS: u16 = 1005;

/// Shared state of the hosting adapter.
#[derive(Clone)]
pub struct UpgradeState {
    pub app: Arc<GBuilder>,
    pub shutdown: Shutdown,
    pub local_addr: SocketAddr,
    pub secure: bool,
    pub channel_capacity: usize,
    pub max_connections: usize,
}

/// Fallback handler: every path is offered to the application.
pub async fn upgrade_handler(
    State(state): State<UpgradeState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    uri: Uri,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            tracing::debug!(path = %uri.path(), reason = %rejection.body_text(), "Not a websocket upgrade");
            return (StatusCode::UPGRADE_REQUIRED, "websocket connections only").into_response();
        }
    };

    // Reserve the slot before the application runs.
    let Some(connection) = state.app.tracker().try_track(state.max_connections as u64) else {
        tracing::warn!(max = state.max_connections, "Connection limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    let mut scope = websocket_scope(&uri, &headers, client, state.local_addr, state.secure);
    scope.connection = Some(Arc::new(connection));
    tracing::debug!(
        request_id = %request_id(&headers),
        client = %client,
        path = %scope.path,
        "WebSocket upgrade requested"
    );

    let ((inbound, inbound_rx), (outbound_tx, mut outbound)) = channel(state.channel_capacity);
    let app = state.app.clone();
    tokio::spawn(async move {
        // Errors were already logged and answered by the error layers.
        let _ = app.handle_connection(scope, inbound_rx, outbound_tx).await;
    });

    if inbound.send(Inbound::Connect).await.is_err() {
        return StatusCode::FORBIDDEN.into_response();
    }

    match outbound.recv().await {
        Some(Outbound::Accept { subprotocol, headers }) => {
            let upgrade = match subprotocol {
                Some(protocol) => upgrade.protocols([protocol]),
                None => upgrade,
            };
            let shutdown = state.shutdown.subscribe();
            let mut response =
                upgrade.on_upgrade(move |socket| pump(socket, inbound, outbound, shutdown));
            for (name, value) in headers {
                match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                    (Ok(name), Ok(value)) => {
                        response.headers_mut().append(name, value);
                    }
                    _ => tracing::warn!(header = %name, "Dropping invalid accept header"),
                }
            }
            response
        }
        Some(Outbound::Close { code, .. }) => {
            tracing::debug!(path = %uri.path(), code, "Handshake rejected by application");
            StatusCode::FORBIDDEN.into_response()
        }
        Some(other) => {
            tracing::error!(message = ?other, "Unexpected message before handshake");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        None => {
            tracing::debug!(path = %uri.path(), "Application exited before accepting");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// How the socket reader stopped.
enum ReadEnd {
    /// The client closed or the connection broke.
    Peer,
    /// The application stopped listening.
    Application,
}

/// Move frames between the socket and the application until either side
/// closes or the server shuts down.
///
/// Reading and writing run as separate tasks so a full inbound channel never
/// stalls outbound frames or the shutdown signal.
async fn pump(socket: Socket, inbound: InboundTx, outbound: OutboundRx, shutdown: broadcast::Receiver<()>) {
    let (sink, stream) = socket.split();

    let mut read_task = tokio::spawn(read_frames(stream, inbound.clone()));
    let mut write_task = tokio::spawn(write_frames(sink, outbound, shutdown));

    let disconnect = tokio::select! {
        read = &mut read_task => match read {
            // Let queued replies (usually a close frame) reach the client.
            Ok(ReadEnd::Application) => (&mut write_task).await.ok().flatten(),
            _ => {
                write_task.abort();
                None
            }
        },
        written = &mut write_task => {
            read_task.abort();
            written.ok().flatten()
        }
    };

    if let Some(code) = disconnect {
        // The application may not be reading; never block the pump on it.
        tokio::spawn(async move {
            let _ = inbound.send(Inbound::Disconnect { code }).await;
        });
    }
}

async fn read_frames(mut stream: SplitStream<Socket>, inbound: InboundTx) -> ReadEnd {
    while let Some(frame) = stream.next().await {
        let event = match frame {
            Ok(Message::Text(text)) => Inbound::Receive(Frame::Text(text.to_string())),
            Ok(Message::Binary(data)) => Inbound::Receive(Frame::Binary(data.to_vec())),
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Ok(Message::Close(frame)) => {
                let code = frame.map_or(CLOSE_NO_STATUS, |frame| frame.code);
                let _ = inbound.send(Inbound::Disconnect { code }).await;
                return ReadEnd::Peer;
            }
            Err(e) => {
                tracing::debug!(error = %e, "WebSocket read failed");
                break;
            }
        };
        if inbound.send(event).await.is_err() {
            return ReadEnd::Application;
        }
    }
    let _ = inbound.send(Inbound::Disconnect { code: CLOSE_ABNORMAL }).await;
    ReadEnd::Peer
}

/// Returns the disconnect code to report when the socket went away under
/// the application.
async fn write_frames(
    mut sink: SplitSink<Socket, Message>,
    mut outbound: OutboundRx,
    mut shutdown: broadcast::Receiver<()>,
) -> Option<u16> {
    loop {
        let message = tokio::select! {
            message = outbound.recv() => message,
            _ = shutdown.recv() => {
                let _ = sink.send(close_message(CLOSE_GOING_AWAY, "server shutting down".into())).await;
                return Some(CLOSE_GOING_AWAY);
            }
        };
        let message = match message {
            Some(Outbound::Send(Frame::Text(text))) => Message::Text(text.into()),
            Some(Outbound::Send(Frame::Binary(data))) => Message::Binary(data.into()),
            Some(Outbound::Close { code, reason }) => {
                let _ = sink.send(close_message(code, reason)).await;
                return None;
            }
            Some(other) => {
                tracing::warn!(message = ?other, "Ignoring message after handshake");
                continue;
            }
            None => {
                let _ = sink.send(close_message(CLOSE_NORMAL, String::new())).await;
                return None;
            }
        };
        if let Err(e) = sink.send(message).await {
            tracing::debug!(error = %e, "WebSocket write failed");
            return Some(CLOSE_ABNORMAL);
        }
    }
}

fn close_message(code: u16, reason: String) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}
