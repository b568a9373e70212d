use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DomainError {
    #[error("Frame too large: declared {declared} bytes (max {max})")]
    FrameTooLarge { declared: usize, max: usize },

    #[error("Message too large to frame: {0} bytes")]
    MessageTooLarge(usize),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Connection idle for {0:?}")]
    IdleTimeout(Duration),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Transport timeout waiting for {server}")]
    TransportTimeout { server: String },

    #[error("Transport connection refused by {server}")]
    TransportConnectionRefused { server: String },

    #[error("Transport error with {server}: {reason}")]
    TransportError { server: String, reason: String },

    #[error("Failed to bind listener on {addr}: {reason}")]
    BindFailed { addr: String, reason: String },

    #[error("Invalid TLS credentials: {0}")]
    InvalidTlsCredentials(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DomainError {
    /// Whether the error only means the peer went away.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::IdleTimeout(_))
    }
}

impl From<crate::config::ConfigError> for DomainError {
    fn from(e: crate::config::ConfigError) -> Self {
        Self::ConfigError(e.to_string())
    }
}
