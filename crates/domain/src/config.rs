pub mod errors;
pub mod limits;
pub mod logging;
pub mod root;
pub mod server;
pub mod tls;
pub mod upstream;

pub use errors::ConfigError;
pub use limits::LimitsConfig;
pub use logging::LoggingConfig;
pub use root::{CliOverrides, Config};
pub use server::ServerConfig;
pub use tls::TlsConfig;
pub use upstream::UpstreamConfig;
