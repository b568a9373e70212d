use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest accepted message size: a bare DNS header.
pub const MIN_MESSAGE_SIZE: usize = 12;

/// Largest payload the 2-byte length prefix can describe.
pub const MAX_FRAME_SIZE: usize = u16::MAX as usize;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Upper bound for query frames and upstream responses.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Upstream exchanges allowed in flight across all connections.
    #[serde(default = "default_max_inflight_queries")]
    pub max_inflight_queries: usize,

    /// Concurrent client connections. 0 means unbounded.
    #[serde(default)]
    pub max_connections: usize,

    /// How long live sessions may keep running after shutdown is requested.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl LimitsConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            max_inflight_queries: default_max_inflight_queries(),
            max_connections: 0,
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_max_message_size() -> usize {
    512
}

fn default_max_inflight_queries() -> usize {
    1024
}

fn default_shutdown_grace_secs() -> u64 {
    10
}
