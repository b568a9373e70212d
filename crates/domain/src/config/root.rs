use serde::{Deserialize, Serialize};

use super::errors::ConfigError;
use super::limits::{LimitsConfig, MAX_FRAME_SIZE, MIN_MESSAGE_SIZE};
use super::logging::LoggingConfig;
use super::server::ServerConfig;
use super::tls::TlsConfig;
use super::upstream::UpstreamConfig;

const LOCAL_CONFIG_PATH: &str = "dot-relay.toml";
const SYSTEM_CONFIG_PATH: &str = "/etc/dot-relay/config.toml";

/// Main configuration structure for the DoT relay
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Listener configuration (bind address, port, idle timeout)
    #[serde(default)]
    pub server: ServerConfig,

    /// Certificate and key locations
    #[serde(default)]
    pub tls: TlsConfig,

    /// UDP resolver queries are forwarded to
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Message size and concurrency limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. dot-relay.toml in current directory
    /// 3. /etc/dot-relay/config.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if let Some(path) = Self::get_config_path() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply command-line overrides to configuration
    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(bind) = overrides.bind_address {
            self.server.bind_address = bind;
        }
        if let Some(secs) = overrides.idle_timeout_secs {
            self.server.idle_timeout_secs = secs;
        }
        if let Some(upstream) = overrides.upstream {
            self.upstream.address = upstream;
        }
        if let Some(cert) = overrides.cert_path {
            self.tls.cert_path = cert;
        }
        if let Some(key) = overrides.key_path {
            self.tls.key_path = key;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("DoT port cannot be 0".to_string()));
        }

        self.upstream.socket_addr()?;

        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "Upstream timeout cannot be 0".to_string(),
            ));
        }

        let size = self.limits.max_message_size;
        if !(MIN_MESSAGE_SIZE..=MAX_FRAME_SIZE).contains(&size) {
            return Err(ConfigError::Validation(format!(
                "max_message_size must be between {} and {}, got {}",
                MIN_MESSAGE_SIZE, MAX_FRAME_SIZE, size
            )));
        }

        if self.limits.max_inflight_queries == 0 {
            return Err(ConfigError::Validation(
                "max_inflight_queries cannot be 0".to_string(),
            ));
        }

        if self.tls.cert_path.trim().is_empty() || self.tls.key_path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "TLS certificate and key paths are required".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, toml_string)
            .map_err(|e| ConfigError::FileWrite(path.to_string(), e.to_string()))?;
        Ok(())
    }

    /// Get the path to the configuration file being used
    pub fn get_config_path() -> Option<String> {
        if std::path::Path::new(LOCAL_CONFIG_PATH).exists() {
            Some(LOCAL_CONFIG_PATH.to_string())
        } else if std::path::Path::new(SYSTEM_CONFIG_PATH).exists() {
            Some(SYSTEM_CONFIG_PATH.to_string())
        } else {
            None
        }
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub idle_timeout_secs: Option<u64>,
    pub upstream: Option<String>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
    pub log_level: Option<String>,
}
