use dot_relay_domain::Config;
use dot_relay_infrastructure::dns::DotServer;
use dot_relay_infrastructure::tls;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn start_dot_server(config: &Config) -> anyhow::Result<()> {
    let tls_config = tls::load_server_config(&config.tls)?;
    let server = DotServer::bind(config, tls_config).await?;

    let drain = server.drain_handle();
    let stats = server.stats();

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_shutdown_signal(shutdown.clone()));

    let result = server.serve(shutdown).await;

    let grace = config.limits.shutdown_grace();
    let active = drain.active_sessions();
    if active > 0 {
        info!(
            active_sessions = active,
            grace_secs = grace.as_secs(),
            "Waiting for live sessions to finish"
        );
    }
    if !drain.drain(grace).await {
        warn!(
            remaining_sessions = drain.active_sessions(),
            "Grace period elapsed, abandoning remaining sessions"
        );
    }

    let snapshot = stats.snapshot();
    info!(
        connections = snapshot.connections_accepted,
        handshakes_failed = snapshot.handshakes_failed,
        queries = snapshot.queries_received,
        responses = snapshot.responses_sent,
        upstream_failures = snapshot.upstream_failures,
        client_write_failures = snapshot.client_write_failures,
        oversize_frames = snapshot.oversize_frames,
        "Relay statistics"
    );

    Ok(result?)
}

async fn wait_for_shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "Cannot install SIGTERM handler, using Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown signal received, stopping listener");
    shutdown.cancel();
}
