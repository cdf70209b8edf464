//! The connection object handed to route handlers.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::app::State;
use crate::error::{AppError, HandlerError};
use crate::routing::{ParamValue, PathParams, UrlPath};
use crate::websocket::message::{
    Frame, Inbound, InboundRx, Outbound, OutboundTx, CLOSE_ABNORMAL, CLOSE_NORMAL,
};
use crate::websocket::scope::ConnectionScope;

/// State of one side of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebSocketState {
    Connecting,
    Connected,
    Disconnected,
}

/// A WebSocket connection bound to its scope.
///
/// Client state follows what the transport reported; application state
/// follows what the handler sent. Out-of-order use is a
/// [`HandlerError::Runtime`].
#[derive(Debug)]
pub struct WebSocket {
    scope: ConnectionScope,
    receive: InboundRx,
    send: OutboundTx,
    client_state: WebSocketState,
    application_state: WebSocketState,
}

impl WebSocket {
    pub fn new(scope: ConnectionScope, receive: InboundRx, send: OutboundTx) -> Self {
        Self {
            scope,
            receive,
            send,
            client_state: WebSocketState::Connecting,
            application_state: WebSocketState::Connecting,
        }
    }

    pub fn scope(&self) -> &ConnectionScope {
        &self.scope
    }

    pub fn path_params(&self) -> &PathParams {
        &self.scope.path_params
    }

    pub fn path_param(&self, name: &str) -> Option<&ParamValue> {
        self.scope.path_params.get(name)
    }

    /// Application state shared by all connections.
    pub fn state(&self) -> Arc<State> {
        self.scope.state.clone().unwrap_or_default()
    }

    /// Reverse a named route of the router serving this connection.
    pub fn url_path_for(&self, name: &str, params: &PathParams) -> Result<UrlPath, AppError> {
        match &self.scope.router {
            Some(router) => router.url_path_for(name, params),
            None => Err(AppError::RouteNotFound { name: name.to_string() }),
        }
    }

    pub fn client_state(&self) -> WebSocketState {
        self.client_state
    }

    pub fn application_state(&self) -> WebSocketState {
        self.application_state
    }

    /// Receive the next raw event from the transport.
    pub async fn receive(&mut self) -> Result<Inbound, HandlerError> {
        if self.client_state == WebSocketState::Disconnected {
            return Err(HandlerError::Runtime(
                "cannot receive once a disconnect event has been received".into(),
            ));
        }

        let message = self
            .receive
            .recv()
            .await
            .unwrap_or(Inbound::Disconnect { code: CLOSE_ABNORMAL });

        if self.client_state == WebSocketState::Connecting {
            if message != Inbound::Connect {
                return Err(HandlerError::Runtime(format!(
                    "expected a connect event, received {message:?}"
                )));
            }
            self.client_state = WebSocketState::Connected;
            return Ok(message);
        }

        match message {
            Inbound::Receive(_) => {}
            Inbound::Disconnect { .. } => self.client_state = WebSocketState::Disconnected,
            other => {
                return Err(HandlerError::Runtime(format!(
                    "expected a receive or disconnect event, received {other:?}"
                )))
            }
        }
        Ok(message)
    }

    /// Send a raw event to the transport.
    pub async fn send(&mut self, message: Outbound) -> Result<(), HandlerError> {
        match self.application_state {
            WebSocketState::Connecting => match &message {
                Outbound::Accept { .. } => self.application_state = WebSocketState::Connected,
                Outbound::Close { .. } => self.application_state = WebSocketState::Disconnected,
                other => {
                    return Err(HandlerError::Runtime(format!(
                        "expected accept or close before {other:?}"
                    )))
                }
            },
            WebSocketState::Connected => match &message {
                Outbound::Send(_) => {}
                Outbound::Close { .. } => self.application_state = WebSocketState::Disconnected,
                other => {
                    return Err(HandlerError::Runtime(format!(
                        "expected send or close, got {other:?}"
                    )))
                }
            },
            WebSocketState::Disconnected => {
                return Err(HandlerError::Runtime(
                    "cannot send once a close event has been sent".into(),
                ))
            }
        }

        if self.send.send(message).await.is_err() {
            self.application_state = WebSocketState::Disconnected;
            return Err(HandlerError::Disconnected { code: CLOSE_ABNORMAL });
        }
        Ok(())
    }

    /// Complete the handshake, optionally selecting a subprotocol.
    pub async fn accept(&mut self, subprotocol: Option<&str>) -> Result<(), HandlerError> {
        self.accept_with_headers(subprotocol, Vec::new()).await
    }

    /// Complete the handshake with extra response headers.
    pub async fn accept_with_headers(
        &mut self,
        subprotocol: Option<&str>,
        headers: Vec<(String, String)>,
    ) -> Result<(), HandlerError> {
        if self.client_state == WebSocketState::Connecting {
            self.receive().await?;
        }
        self.send(Outbound::Accept {
            subprotocol: subprotocol.map(str::to_owned),
            headers,
        })
        .await
    }

    /// Close the connection. Before accept this rejects the handshake.
    pub async fn close(&mut self, code: u16, reason: Option<&str>) -> Result<(), HandlerError> {
        self.send(Outbound::Close {
            code,
            reason: reason.unwrap_or_default().to_string(),
        })
        .await
    }

    /// Receive one data frame, failing on disconnect.
    pub async fn receive_frame(&mut self) -> Result<Frame, HandlerError> {
        if self.application_state != WebSocketState::Connected {
            return Err(HandlerError::Runtime(
                "websocket is not connected; call accept first".into(),
            ));
        }
        match self.receive().await? {
            Inbound::Receive(frame) => Ok(frame),
            Inbound::Disconnect { code } => Err(HandlerError::Disconnected { code }),
            other => Err(HandlerError::Runtime(format!("unexpected event {other:?}"))),
        }
    }

    pub async fn receive_text(&mut self) -> Result<String, HandlerError> {
        match self.receive_frame().await? {
            Frame::Text(text) => Ok(text),
            Frame::Binary(_) => Err(HandlerError::Runtime("expected a text frame".into())),
        }
    }

    pub async fn receive_bytes(&mut self) -> Result<Vec<u8>, HandlerError> {
        match self.receive_frame().await? {
            Frame::Binary(data) => Ok(data),
            Frame::Text(_) => Err(HandlerError::Runtime("expected a binary frame".into())),
        }
    }

    /// Receive a JSON document from either a text or a binary frame.
    pub async fn receive_json<T: DeserializeOwned>(&mut self) -> Result<T, HandlerError> {
        let value = match self.receive_frame().await? {
            Frame::Text(text) => serde_json::from_str(&text)?,
            Frame::Binary(data) => serde_json::from_slice(&data)?,
        };
        Ok(value)
    }

    /// Next text frame, or `None` once the client disconnects.
    pub async fn next_text(&mut self) -> Result<Option<String>, HandlerError> {
        match self.receive_text().await {
            Ok(text) => Ok(Some(text)),
            Err(HandlerError::Disconnected { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Next binary frame, or `None` once the client disconnects.
    pub async fn next_bytes(&mut self) -> Result<Option<Vec<u8>>, HandlerError> {
        match self.receive_bytes().await {
            Ok(data) => Ok(Some(data)),
            Err(HandlerError::Disconnected { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<(), HandlerError> {
        self.send(Outbound::Send(Frame::Text(text.into()))).await
    }

    pub async fn send_bytes(&mut self, data: impl Into<Vec<u8>>) -> Result<(), HandlerError> {
        self.send(Outbound::Send(Frame::Binary(data.into()))).await
    }

    pub async fn send_json<T: Serialize>(&mut self, value: &T) -> Result<(), HandlerError> {
        let text = serde_json::to_string(value)?;
        self.send_text(text).await
    }

    /// Close with 1000 unless already closed.
    pub async fn finish(&mut self) -> Result<(), HandlerError> {
        if self.application_state == WebSocketState::Disconnected {
            return Ok(());
        }
        self.close(CLOSE_NORMAL, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::message::channel;

    fn socket() -> (WebSocket, crate::websocket::InboundTx, crate::websocket::OutboundRx) {
        let ((in_tx, in_rx), (out_tx, out_rx)) = channel(8);
        (WebSocket::new(ConnectionScope::websocket("/"), in_rx, out_tx), in_tx, out_rx)
    }

    #[tokio::test]
    async fn accept_consumes_connect_and_sends_accept() {
        let (mut ws, in_tx, mut out_rx) = socket();
        in_tx.send(Inbound::Connect).await.unwrap();

        ws.accept(Some("chat")).await.unwrap();

        assert_eq!(ws.client_state(), WebSocketState::Connected);
        assert_eq!(ws.application_state(), WebSocketState::Connected);
        assert_eq!(
            out_rx.recv().await,
            Some(Outbound::Accept {
                subprotocol: Some("chat".into()),
                headers: Vec::new()
            })
        );
    }

    #[tokio::test]
    async fn send_before_accept_is_rejected() {
        let (mut ws, _in_tx, _out_rx) = socket();
        let err = ws.send_text("early").await.unwrap_err();
        assert!(matches!(err, HandlerError::Runtime(_)));
    }

    #[tokio::test]
    async fn receive_text_reports_disconnect() {
        let (mut ws, in_tx, _out_rx) = socket();
        in_tx.send(Inbound::Connect).await.unwrap();
        ws.accept(None).await.unwrap();

        in_tx.send(Inbound::Receive(Frame::Text("hi".into()))).await.unwrap();
        in_tx.send(Inbound::Disconnect { code: 1001 }).await.unwrap();

        assert_eq!(ws.receive_text().await.unwrap(), "hi");
        let err = ws.receive_text().await.unwrap_err();
        assert!(matches!(err, HandlerError::Disconnected { code: 1001 }));

        // The transport still holds its sender, so this must not wait.
        let err = tokio::time::timeout(std::time::Duration::from_secs(1), ws.receive())
            .await
            .expect("receive after disconnect blocked")
            .unwrap_err();
        assert!(matches!(err, HandlerError::Runtime(_)));
        drop(in_tx);
    }

    #[tokio::test]
    async fn send_on_a_gone_transport_is_an_abnormal_disconnect() {
        let (mut ws, in_tx, out_rx) = socket();
        in_tx.send(Inbound::Connect).await.unwrap();
        ws.accept(None).await.unwrap();
        drop(out_rx);

        let err = ws.send_text("lost").await.unwrap_err();
        assert!(matches!(err, HandlerError::Disconnected { code: 1006 }));
        assert_eq!(ws.application_state(), WebSocketState::Disconnected);
    }

    #[tokio::test]
    async fn dropped_transport_reads_as_abnormal_disconnect() {
        let (mut ws, in_tx, _out_rx) = socket();
        in_tx.send(Inbound::Connect).await.unwrap();
        ws.accept(None).await.unwrap();
        drop(in_tx);

        let err = ws.receive_frame().await.unwrap_err();
        assert!(matches!(err, HandlerError::Disconnected { code: 1006 }));
    }

    #[tokio::test]
    async fn next_text_ends_on_disconnect() {
        let (mut ws, in_tx, _out_rx) = socket();
        in_tx.send(Inbound::Connect).await.unwrap();
        ws.accept(None).await.unwrap();
        in_tx.send(Inbound::Disconnect { code: 1000 }).await.unwrap();

        assert_eq!(ws.next_text().await.unwrap(), None);
    }

    #[tokio::test]
    async fn json_round_trip_through_frames() {
        let (mut ws, in_tx, mut out_rx) = socket();
        in_tx.send(Inbound::Connect).await.unwrap();
        ws.accept(None).await.unwrap();
        let _accept = out_rx.recv().await;

        in_tx
            .send(Inbound::Receive(Frame::Binary(br#"{"n":3}"#.to_vec())))
            .await
            .unwrap();
        let value: serde_json::Value = ws.receive_json().await.unwrap();
        assert_eq!(value["n"], 3);

        ws.send_json(&serde_json::json!({"ok": true})).await.unwrap();
        assert_eq!(
            out_rx.recv().await,
            Some(Outbound::Send(Frame::Text(r#"{"ok":true}"#.into())))
        );
    }

    #[tokio::test]
    async fn close_twice_is_an_error() {
        let (mut ws, in_tx, _out_rx) = socket();
        in_tx.send(Inbound::Connect).await.unwrap();
        ws.accept(None).await.unwrap();

        ws.close(1000, None).await.unwrap();
        assert!(ws.close(1000, None).await.is_err());
        assert!(ws.finish().await.is_ok());
    }
}
