use super::dispatcher::QueryDispatcher;
use super::framing::decode_frame;
use super::stats::RelayStats;
use super::writer::ResponseWriter;
use bytes::Bytes;
use dot_relay_domain::{Config, DomainError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tracing::{debug, warn};

/// Per-connection knobs, copied out of the relay configuration.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub idle_timeout: Option<Duration>,
    pub max_message_size: usize,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            idle_timeout: config.server.idle_timeout(),
            max_message_size: config.limits.max_message_size,
        }
    }
}

/// One accepted client connection.
///
/// Queries are read strictly one after another; each one is handed to its
/// own dispatch task and the loop goes straight back to reading. Responses
/// go through the shared [`ResponseWriter`] in whatever order the upstream
/// answers.
pub struct ConnectionSession<S> {
    reader: ReadHalf<S>,
    writer: ResponseWriter<WriteHalf<S>>,
    peer: SocketAddr,
    settings: SessionSettings,
    dispatcher: Arc<QueryDispatcher>,
    stats: Arc<RelayStats>,
}

impl<S> ConnectionSession<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(
        stream: S,
        peer: SocketAddr,
        settings: SessionSettings,
        dispatcher: Arc<QueryDispatcher>,
        stats: Arc<RelayStats>,
    ) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader,
            writer: ResponseWriter::new(writer),
            peer,
            settings,
            dispatcher,
            stats,
        }
    }

    /// Serve the connection until a read fails; returns why it ended.
    pub async fn run(mut self) -> DomainError {
        let mut queries: u64 = 0;

        let reason = loop {
            let query = match self.next_query().await {
                Ok(query) => query,
                Err(e) => break e,
            };
            queries += 1;
            self.stats.record_query();

            if self.writer.is_poisoned() {
                break DomainError::IoError("Response stream was cut mid-frame".to_string());
            }

            let Some(permit) = self.dispatcher.acquire().await else {
                break DomainError::IoError("Dispatch pool closed".to_string());
            };
            let writer = self.writer.clone();
            self.dispatcher.spawn(query, writer, self.peer, permit);
        };

        if let DomainError::FrameTooLarge { .. } = reason {
            self.stats.record_oversize_frame();
        }

        // A peer that only half-closed still receives answers already in
        // flight: the write half closes when the last dispatch drops it.
        if !matches!(reason, DomainError::ConnectionClosed) {
            if let Err(e) = self.writer.shutdown().await {
                debug!(peer = %self.peer, error = %e, "Writer shutdown failed");
            }
        }

        if reason.is_disconnect() {
            debug!(peer = %self.peer, queries = queries, reason = %reason, "Session closed");
        } else {
            warn!(
                peer = %self.peer,
                queries = queries,
                phase = "client_read",
                error = %reason,
                "Session terminated"
            );
        }

        reason
    }

    async fn next_query(&mut self) -> Result<Bytes, DomainError> {
        let read = decode_frame(&mut self.reader, self.settings.max_message_size);

        match self.settings.idle_timeout {
            Some(idle) => tokio::time::timeout(idle, read)
                .await
                .map_err(|_| DomainError::IdleTimeout(idle))?,
            None => read.await,
        }
    }
}
