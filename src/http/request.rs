//! Translate an HTTP upgrade request into a connection scope.
//!
//! # Responsibilities
//! - Copy path, query string and headers into a `ConnectionScope`
//! - Parse the requested subprotocols
//! - Record peer and local addresses
//!
//! # Design Decisions
//! - Header names are lowercased; values that are not valid UTF-8 are skipped
//! - The path is taken verbatim from the request line (no percent-decoding)

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, Uri};

use crate::websocket::ConnectionScope;

/// Header carrying the correlation ID set by the request-id layer.
pub const X_REQUEST_ID: &str = "x-request-id";

pub fn websocket_scope(
    uri: &Uri,
    headers: &HeaderMap,
    client: SocketAddr,
    server: SocketAddr,
    secure: bool,
) -> ConnectionScope {
    let mut scope = ConnectionScope::websocket(uri.path());
    scope.query_string = uri.query().unwrap_or_default().to_string();
    scope.scheme = if secure { "wss" } else { "ws" }.to_string();
    scope.client = Some(client);
    scope.server = Some(server);
    scope.headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
        })
        .collect();
    scope.subprotocols = headers
        .get_all(header::SEC_WEBSOCKET_PROTOCOL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|protocol| !protocol.is_empty())
        .map(str::to_owned)
        .collect();
    scope
}

/// Correlation ID of the request, if the request-id layer set one.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn builds_scope_from_request_parts() {
        let uri: Uri = "/rooms/lobby?token=abc".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("origin", HeaderValue::from_static("https://example.com"));
        headers.append(header::SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static("chat, superchat"));
        headers.append(header::SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static("json"));
        let client: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let server: SocketAddr = "127.0.0.1:8080".parse().unwrap();

        let scope = websocket_scope(&uri, &headers, client, server, true);

        assert!(scope.is_websocket());
        assert_eq!(scope.path, "/rooms/lobby");
        assert_eq!(scope.query_string, "token=abc");
        assert_eq!(scope.scheme, "wss");
        assert_eq!(scope.header("origin"), Some("https://example.com"));
        assert_eq!(scope.subprotocols, vec!["chat", "superchat", "json"]);
        assert_eq!(scope.client, Some(client));
    }
}
