//! DNS-over-TLS listener (RFC 7858)
//!
//! Accepts TCP connections, runs the TLS handshake in the connection's own
//! task and hands the encrypted stream to a [`ConnectionSession`]. Shutdown
//! only stops the accept loop: sessions already running are left alone and
//! end on their own (idle timeout, I/O error or client close). The
//! [`DrainHandle`] lets the caller wait a bounded time for them.

use super::dispatcher::QueryDispatcher;
use super::session::{ConnectionSession, SessionSettings};
use super::stats::RelayStats;
use super::transport::{DnsTransport, UdpTransport};
use dot_relay_domain::{Config, DomainError};
use rustls::ServerConfig;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

const LISTEN_BACKLOG: i32 = 1024;

/// Handshake bound used when no idle timeout is configured.
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after an accept error that is not tied to a single connection
/// (descriptor exhaustion and the like).
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub struct DotServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    acceptor: TlsAcceptor,
    settings: SessionSettings,
    dispatcher: Arc<QueryDispatcher>,
    connection_limit: Option<Arc<Semaphore>>,
    sessions: TaskTracker,
    stats: Arc<RelayStats>,
}

impl DotServer {
    /// Bind the listener and forward queries to the configured UDP upstream.
    pub async fn bind(config: &Config, tls_config: Arc<ServerConfig>) -> Result<Self, DomainError> {
        let upstream = config.upstream.socket_addr()?;
        let transport = Arc::new(UdpTransport::new(
            upstream,
            config.limits.max_message_size,
        ));
        Self::bind_with_transport(config, tls_config, transport).await
    }

    pub async fn bind_with_transport(
        config: &Config,
        tls_config: Arc<ServerConfig>,
        transport: Arc<dyn DnsTransport>,
    ) -> Result<Self, DomainError> {
        let listen_addr = config.server.listen_addr();
        let bind_failed = |reason: String| DomainError::BindFailed {
            addr: listen_addr.clone(),
            reason,
        };

        let socket_addr = tokio::net::lookup_host(listen_addr.as_str())
            .await
            .map_err(|e| bind_failed(e.to_string()))?
            .next()
            .ok_or_else(|| bind_failed("address did not resolve".to_string()))?;

        let listener = create_tcp_listener(socket_addr).map_err(|e| bind_failed(e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| bind_failed(e.to_string()))?;

        let stats = Arc::new(RelayStats::new());
        let dispatcher = Arc::new(QueryDispatcher::new(
            Arc::clone(&transport),
            config.upstream.timeout(),
            config.limits.max_inflight_queries,
            Arc::clone(&stats),
        ));

        let connection_limit = match config.limits.max_connections {
            0 => None,
            limit => Some(Arc::new(Semaphore::new(limit))),
        };

        info!(
            bind_address = %local_addr,
            upstream = %transport.server_addr(),
            upstream_protocol = transport.protocol_name(),
            max_message_size = config.limits.max_message_size,
            max_inflight_queries = config.limits.max_inflight_queries,
            max_connections = config.limits.max_connections,
            idle_timeout_secs = config.server.idle_timeout_secs,
            "DoT listener bound"
        );

        Ok(Self {
            listener,
            local_addr,
            acceptor: TlsAcceptor::from(tls_config),
            settings: SessionSettings::from_config(config),
            dispatcher,
            connection_limit,
            sessions: TaskTracker::new(),
            stats,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> Arc<RelayStats> {
        Arc::clone(&self.stats)
    }

    pub fn drain_handle(&self) -> DrainHandle {
        DrainHandle {
            sessions: self.sessions.clone(),
            dispatches: self.dispatcher.tasks(),
        }
    }

    /// Accept connections until `shutdown` fires.
    ///
    /// The listening socket is closed when this returns. Accept errors never
    /// end the loop; persistent ones are retried after a short pause.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), DomainError> {
        info!(bind_address = %self.local_addr, "DoT server ready");

        self.accept_loop(&shutdown).await;
        self.sessions.close();

        info!(
            active_sessions = self.sessions.len(),
            "DoT listener closed, no longer accepting"
        );
        Ok(())
    }

    async fn accept_loop(&self, shutdown: &CancellationToken) {
        loop {
            let permit = match &self.connection_limit {
                Some(limit) => tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return,
                    permit = Arc::clone(limit).acquire_owned() => permit.ok(),
                },
                None => None,
            };

            let accepted = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return,
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(conn) => conn,
                Err(e) if is_transient_accept_error(&e) => {
                    debug!(error = %e, "Transient accept error");
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed, backing off");
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => return,
                        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => {}
                    }
                    continue;
                }
            };

            self.stats.record_connection();
            self.spawn_session(stream, peer, permit);
        }
    }

    fn spawn_session(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        permit: Option<OwnedSemaphorePermit>,
    ) {
        let acceptor = self.acceptor.clone();
        let settings = self.settings;
        let dispatcher = Arc::clone(&self.dispatcher);
        let stats = Arc::clone(&self.stats);

        self.sessions.spawn(async move {
            let _permit = permit;
            if let Err(e) = stream.set_nodelay(true) {
                debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
            }

            let handshake_timeout = settings.idle_timeout.unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT);
            let tls_stream =
                match tokio::time::timeout(handshake_timeout, acceptor.accept(stream)).await {
                    Ok(Ok(tls_stream)) => tls_stream,
                    Ok(Err(e)) => {
                        stats.record_handshake_failure();
                        debug!(peer = %peer, error = %e, "TLS handshake failed");
                        return;
                    }
                    Err(_) => {
                        stats.record_handshake_failure();
                        debug!(peer = %peer, "TLS handshake timed out");
                        return;
                    }
                };

            debug!(peer = %peer, "DoT connection established");
            ConnectionSession::new(tls_stream, peer, settings, dispatcher, stats)
                .run()
                .await;
        });
    }
}

/// Waits for sessions and dispatches left running after shutdown.
#[derive(Clone)]
pub struct DrainHandle {
    sessions: TaskTracker,
    dispatches: TaskTracker,
}

impl DrainHandle {
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if everything finished within `grace`.
    pub async fn drain(&self, grace: Duration) -> bool {
        tokio::time::timeout(grace, async {
            self.sessions.wait().await;
            // No session left means no new dispatch can start.
            self.dispatches.close();
            self.dispatches.wait().await;
        })
        .await
        .is_ok()
    }
}

fn is_transient_accept_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

fn create_tcp_listener(socket_addr: SocketAddr) -> io::Result<TcpListener> {
    let domain = if socket_addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    if socket_addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;
    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}
