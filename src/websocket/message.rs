//! Transport boundary messages.
//!
//! A connection is driven by two channels: the transport pushes [`Inbound`]
//! events and the application answers with [`Outbound`] events. Lifespan
//! events travel over the same pair of channels on a `lifespan` scope.

use tokio::sync::mpsc;

/// Close code sent when nothing matched or the handler finished normally.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code used when the server is going away.
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Close code reported when the peer vanished without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Close code sent when the application failed unexpectedly.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// Default per-connection channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// A data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Events delivered by the transport to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// The client asked to open the connection.
    Connect,
    /// A data frame arrived.
    Receive(Frame),
    /// The client disconnected.
    Disconnect { code: u16 },
    /// Lifespan: run startup.
    Startup,
    /// Lifespan: run shutdown.
    Shutdown,
}

/// Events sent by the application to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Complete the handshake.
    Accept {
        subprotocol: Option<String>,
        headers: Vec<(String, String)>,
    },
    /// Send a data frame.
    Send(Frame),
    /// Close the connection. Before `Accept` this rejects the handshake.
    Close { code: u16, reason: String },
    StartupComplete,
    StartupFailed { message: String },
    ShutdownComplete,
    ShutdownFailed { message: String },
}

impl Outbound {
    /// A close event with an empty reason.
    pub fn close(code: u16) -> Self {
        Outbound::Close {
            code,
            reason: String::new(),
        }
    }
}

pub type InboundTx = mpsc::Sender<Inbound>;
pub type InboundRx = mpsc::Receiver<Inbound>;
pub type OutboundTx = mpsc::Sender<Outbound>;
pub type OutboundRx = mpsc::Receiver<Outbound>;

/// Create the inbound and outbound channel pairs for one connection.
pub fn channel(capacity: usize) -> ((InboundTx, InboundRx), (OutboundTx, OutboundRx)) {
    (mpsc::channel(capacity), mpsc::channel(capacity))
}
