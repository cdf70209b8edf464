//! Connection lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track each connection's phase (Arrived → Matched → HandlerRunning → Closed)
//! - Count active connections for capacity checks and shutdown draining
//! - Record per-connection metrics when a connection ends

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough since only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Phase of a single connection.
///
/// ```text
/// Arrived → Matched → HandlerRunning → Closed | Errored
/// Arrived → Rejected → Closed
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Arrived = 0,
    Matched = 1,
    HandlerRunning = 2,
    Rejected = 3,
    Closed = 4,
    Errored = 5,
}

impl From<u8> for ConnectionPhase {
    fn from(val: u8) -> Self {
        match val {
            1 => ConnectionPhase::Matched,
            2 => ConnectionPhase::HandlerRunning,
            3 => ConnectionPhase::Rejected,
            4 => ConnectionPhase::Closed,
            5 => ConnectionPhase::Errored,
            _ => ConnectionPhase::Arrived,
        }
    }
}

impl ConnectionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionPhase::Arrived => "arrived",
            ConnectionPhase::Matched => "matched",
            ConnectionPhase::HandlerRunning => "handler_running",
            ConnectionPhase::Rejected => "rejected",
            ConnectionPhase::Closed => "closed",
            ConnectionPhase::Errored => "errored",
        }
    }
}

/// Tracks active connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection. The returned guard decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        self.guard()
    }

    /// Record a new connection unless `max` are already active.
    pub fn try_track(&self, max: u64) -> Option<ConnectionGuard> {
        self.active_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |active| (active < max).then_some(active + 1))
            .ok()?;
        Some(self.guard())
    }

    fn guard(&self) -> ConnectionGuard {
        metrics::connection_opened();
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
            phase: AtomicU8::new(ConnectionPhase::Arrived as u8),
            opened_at: Instant::now(),
        }
    }

    /// Current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until every tracked connection has ended.
    pub async fn wait_for_shutdown(&self) {
        while self.active_count.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Guard that tracks a connection's lifetime and phase.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
    phase: AtomicU8,
    opened_at: Instant,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn phase(&self) -> ConnectionPhase {
        ConnectionPhase::from(self.phase.load(Ordering::SeqCst))
    }

    /// Move to `next`.
    pub fn advance(&self, next: ConnectionPhase) {
        let previous = ConnectionPhase::from(self.phase.swap(next as u8, Ordering::SeqCst));
        tracing::trace!(
            connection_id = %self.id,
            from = previous.as_str(),
            to = next.as_str(),
            "Connection phase changed"
        );
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        let phase = self.phase();
        metrics::connection_closed(phase.as_str(), self.opened_at);
        tracing::trace!(connection_id = %self.id, phase = phase.as_str(), "Connection released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn connection_tracker_counts() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        assert_eq!(tracker.active_count(), 1);

        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);

        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn try_track_respects_the_limit() {
        let tracker = ConnectionTracker::new();
        let first = tracker.try_track(2).unwrap();
        let _second = tracker.try_track(2).unwrap();
        assert!(tracker.try_track(2).is_none());
        assert_eq!(tracker.active_count(), 2);

        drop(first);
        assert!(tracker.try_track(2).is_some());
    }

    #[test]
    fn guard_records_phase_transitions() {
        let tracker = ConnectionTracker::new();
        let guard = tracker.track();
        assert_eq!(guard.phase(), ConnectionPhase::Arrived);

        guard.advance(ConnectionPhase::Rejected);
        guard.advance(ConnectionPhase::Closed);
        assert_eq!(guard.phase(), ConnectionPhase::Closed);
    }

    #[tokio::test]
    async fn wait_for_shutdown_returns_once_drained() {
        let tracker = ConnectionTracker::new();
        let guard = tracker.track();
        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_for_shutdown().await })
        };
        drop(guard);
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("tracker did not drain")
            .unwrap();
    }
}
