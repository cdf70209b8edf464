//! WebSocket connection subsystem.
//!
//! # Data Flow
//! ```text
//! Transport (hosting adapter or test harness)
//!     → message.rs (Inbound / Outbound events over mpsc channels)
//!     → scope.rs (ConnectionScope: type, path, headers, matched params)
//!     → connection.rs (lifecycle tracking: Arrived → Matched → HandlerRunning → Closed)
//!     → socket.rs (WebSocket handed to the route handler)
//! ```
//!
//! # Design Decisions
//! - The transport boundary is plain message passing; no I/O happens here
//! - The connection object enforces the accept/send/close ordering
//! - One task per connection; nothing here is shared between connections

pub mod connection;
pub mod message;
pub mod scope;
pub mod socket;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionPhase, ConnectionTracker};
pub use message::{Frame, Inbound, InboundRx, InboundTx, Outbound, OutboundRx, OutboundTx};
pub use scope::{ConnectionScope, ScopeType};
pub use socket::{WebSocket, WebSocketState};
