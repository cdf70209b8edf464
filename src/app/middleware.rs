//! Connection middleware.
//!
//! Middleware wraps the next [`Application`] in the stack. The shell applies
//! user middleware in declaration order, so the first one declared sees each
//! connection first.

use std::collections::HashSet;
use std::sync::Arc;

use crate::app::{AppFuture, Application};
use crate::websocket::message::{InboundRx, Outbound, OutboundTx};
use crate::websocket::{ConnectionPhase, ConnectionScope};

/// Close code for a policy violation.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: Arc<dyn Application>) -> Arc<dyn Application>;
}

impl<F> Middleware for F
where
    F: Fn(Arc<dyn Application>) -> Arc<dyn Application> + Send + Sync + 'static,
{
    fn wrap(&self, next: Arc<dyn Application>) -> Arc<dyn Application> {
        (self)(next)
    }
}

/// Reject websocket handshakes whose `Origin` is not allow-listed.
///
/// An empty list allows every origin (passthrough mode). Connections without
/// an `Origin` header are not browser connections and pass through.
#[derive(Debug, Clone, Default)]
pub struct AllowedOrigins {
    origins: HashSet<String>,
}

impl AllowedOrigins {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            origins: origins
                .into_iter()
                .map(|origin| origin.into().trim_end_matches('/').to_ascii_lowercase())
                .collect(),
        }
    }

    fn allows(&self, scope: &ConnectionScope) -> bool {
        if self.origins.is_empty() {
            return true;
        }
        match scope.header("origin") {
            Some(origin) => self
                .origins
                .contains(&origin.trim_end_matches('/').to_ascii_lowercase()),
            None => true,
        }
    }
}

impl Middleware for AllowedOrigins {
    fn wrap(&self, next: Arc<dyn Application>) -> Arc<dyn Application> {
        Arc::new(OriginGuard {
            policy: self.clone(),
            next,
        })
    }
}

struct OriginGuard {
    policy: AllowedOrigins,
    next: Arc<dyn Application>,
}

impl Application for OriginGuard {
    fn call(self: Arc<Self>, scope: ConnectionScope, receive: InboundRx, send: OutboundTx) -> AppFuture {
        Box::pin(async move {
            if !scope.is_websocket() || self.policy.allows(&scope) {
                return self.next.clone().call(scope, receive, send).await;
            }

            tracing::warn!(
                origin = scope.header("origin").unwrap_or_default(),
                path = %scope.path,
                "Origin not allowed"
            );
            scope.advance(ConnectionPhase::Rejected);
            let _ = send
                .send(Outbound::Close {
                    code: CLOSE_POLICY_VIOLATION,
                    reason: "origin not allowed".into(),
                })
                .await;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Route, Router};
    use crate::websocket::message::{channel, Inbound};
    use crate::websocket::WebSocket;

    fn stack() -> Arc<dyn Application> {
        let router = Router::new(vec![Route::websocket(
            "/",
            |mut ws: WebSocket| async move { ws.accept(None).await },
            None,
        )
        .unwrap()]);
        AllowedOrigins::new(["https://app.example.com/"]).wrap(Arc::new(router))
    }

    async fn first_reply(scope: ConnectionScope) -> Option<Outbound> {
        let ((in_tx, in_rx), (out_tx, mut out_rx)) = channel(4);
        in_tx.send(Inbound::Connect).await.unwrap();
        stack().call(scope, in_rx, out_tx).await.unwrap();
        out_rx.recv().await
    }

    #[tokio::test]
    async fn listed_origin_passes() {
        let scope = ConnectionScope::websocket("/").with_header("Origin", "https://APP.example.com");
        assert!(matches!(first_reply(scope).await, Some(Outbound::Accept { .. })));
    }

    #[tokio::test]
    async fn unlisted_origin_is_closed_with_policy_violation() {
        let scope = ConnectionScope::websocket("/").with_header("Origin", "https://evil.example");
        assert!(matches!(
            first_reply(scope).await,
            Some(Outbound::Close { code: CLOSE_POLICY_VIOLATION, .. })
        ));
    }
}
