//! DoT Relay Domain Layer
pub mod config;
pub mod errors;

pub use config::{
    CliOverrides, Config, ConfigError, LimitsConfig, LoggingConfig, ServerConfig, TlsConfig,
    UpstreamConfig,
};
pub use errors::DomainError;
