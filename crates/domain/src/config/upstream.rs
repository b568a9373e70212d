use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use super::errors::ConfigError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Plain UDP resolver every query is forwarded to.
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.address.trim().parse().map_err(|e| {
            ConfigError::Validation(format!(
                "Invalid upstream address '{}': {}",
                self.address, e
            ))
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_address() -> String {
    "8.8.8.8:53".to_string()
}

fn default_timeout_secs() -> u64 {
    5
}
