use std::sync::atomic::{AtomicU64, Ordering};

/// Relay-wide counters, shared by the listener, sessions and dispatches.
#[derive(Debug, Default)]
pub struct RelayStats {
    connections_accepted: AtomicU64,
    handshakes_failed: AtomicU64,
    queries_received: AtomicU64,
    responses_sent: AtomicU64,
    upstream_failures: AtomicU64,
    client_write_failures: AtomicU64,
    oversize_frames: AtomicU64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connection(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handshake_failure(&self) {
        self.handshakes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query(&self) {
        self.queries_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response(&self) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_client_write_failure(&self) {
        self.client_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_oversize_frame(&self) {
        self.oversize_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            handshakes_failed: self.handshakes_failed.load(Ordering::Relaxed),
            queries_received: self.queries_received.load(Ordering::Relaxed),
            responses_sent: self.responses_sent.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            client_write_failures: self.client_write_failures.load(Ordering::Relaxed),
            oversize_frames: self.oversize_frames.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStatsSnapshot {
    pub connections_accepted: u64,
    pub handshakes_failed: u64,
    pub queries_received: u64,
    pub responses_sent: u64,
    pub upstream_failures: u64,
    pub client_write_failures: u64,
    pub oversize_frames: u64,
}

impl RelayStatsSnapshot {
    /// Queries read but never answered.
    pub fn dropped_queries(&self) -> u64 {
        self.upstream_failures + self.client_write_failures
    }
}
