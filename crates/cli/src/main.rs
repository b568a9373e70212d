use clap::Parser;
use dot_relay_domain::CliOverrides;
use tracing::{error, info};

mod bootstrap;
mod server;

#[derive(Parser)]
#[command(name = "dot-relay")]
#[command(version)]
#[command(about = "DNS-over-TLS relay to a plain UDP resolver")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// DoT listening port
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Bind address
    #[arg(short = 'b', long)]
    bind: Option<String>,

    /// Upstream UDP resolver (ip:port)
    #[arg(short = 'u', long)]
    upstream: Option<String>,

    /// PEM certificate chain
    #[arg(long, value_name = "FILE")]
    cert: Option<String>,

    /// PEM private key
    #[arg(long, value_name = "FILE")]
    key: Option<String>,

    /// Idle connection timeout in seconds (0 disables it)
    #[arg(long, value_name = "SECS")]
    idle_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let cli_overrides = CliOverrides {
        port: cli.port,
        bind_address: cli.bind,
        idle_timeout_secs: cli.idle_timeout,
        upstream: cli.upstream,
        cert_path: cli.cert,
        key_path: cli.key,
        log_level: cli.log_level,
    };

    let config = bootstrap::load_config(cli.config.as_deref(), cli_overrides)?;

    // Initialize logging
    bootstrap::init_logging(&config);

    info!("Starting DoT relay v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = server::start_dot_server(&config).await {
        error!(error = %e, "DoT relay stopped with an error");
        return Err(e);
    }

    info!("Server shutdown complete");
    Ok(())
}
