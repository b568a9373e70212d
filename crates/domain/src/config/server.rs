use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Address used when the bind address is left empty.
pub const DEFAULT_LISTEN_ADDR: &str = "localhost:853";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds a connection may stay without a complete frame. 0 disables it.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl ServerConfig {
    /// `host:port` the DoT listener binds to.
    pub fn listen_addr(&self) -> String {
        let host = self.bind_address.trim();
        if host.is_empty() {
            return DEFAULT_LISTEN_ADDR.to_string();
        }
        if host.contains(':') && !host.starts_with('[') {
            // bare IPv6 literal
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        match self.idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    853
}

fn default_idle_timeout_secs() -> u64 {
    120
}
