use super::stats::RelayStats;
use super::transport::DnsTransport;
use super::writer::ResponseWriter;
use bytes::Bytes;
use dot_relay_domain::DomainError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Forwards single queries upstream and writes the answers back.
///
/// Shared by every session of a server. The semaphore bounds how many
/// upstream exchanges may be in flight at once across all connections.
pub struct QueryDispatcher {
    transport: Arc<dyn DnsTransport>,
    timeout: Duration,
    permits: Arc<Semaphore>,
    tasks: TaskTracker,
    stats: Arc<RelayStats>,
}

impl QueryDispatcher {
    pub fn new(
        transport: Arc<dyn DnsTransport>,
        timeout: Duration,
        max_inflight: usize,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            transport,
            timeout,
            permits: Arc::new(Semaphore::new(max_inflight)),
            tasks: TaskTracker::new(),
            stats,
        }
    }

    /// Wait for a free dispatch slot.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.permits.clone().acquire_owned().await.ok()
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Tracker of the dispatch tasks spawned so far.
    pub fn tasks(&self) -> TaskTracker {
        self.tasks.clone()
    }

    /// Run one dispatch as its own task. The permit is released when it ends.
    pub fn spawn<W>(
        self: &Arc<Self>,
        query: Bytes,
        writer: ResponseWriter<W>,
        peer: SocketAddr,
        permit: OwnedSemaphorePermit,
    ) -> JoinHandle<()>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let dispatcher = Arc::clone(self);
        self.tasks.spawn(async move {
            let _permit = permit;
            // Failures stay inside this task: the query is dropped and the
            // client never gets an answer for it.
            let _ = dispatcher.dispatch(&query, &writer, peer).await;
        })
    }

    pub async fn dispatch<W>(
        &self,
        query: &[u8],
        writer: &ResponseWriter<W>,
        peer: SocketAddr,
    ) -> Result<(), DomainError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let response = match self.transport.send(query, self.timeout).await {
            Ok(response) => response,
            Err(e) => {
                self.stats.record_upstream_failure();
                warn!(
                    peer = %peer,
                    upstream = %self.transport.server_addr(),
                    phase = "upstream",
                    error = %e,
                    "Dropping query"
                );
                return Err(e);
            }
        };

        let write = tokio::time::timeout(self.timeout, writer.write_frame(&response.bytes));
        let written = match write.await {
            Ok(result) => result,
            Err(_) => Err(DomainError::IoError(format!(
                "Response write timed out after {:?}",
                self.timeout
            ))),
        };

        if let Err(e) = written {
            self.stats.record_client_write_failure();
            warn!(
                peer = %peer,
                phase = "client_write",
                error = %e,
                "Dropping response"
            );
            if writer.is_poisoned() {
                self.close_poisoned(writer, peer).await;
            }
            return Err(e);
        }

        self.stats.record_response();
        debug!(
            peer = %peer,
            query_len = query.len(),
            response_len = response.bytes.len(),
            elapsed_ms = response.elapsed.as_millis() as u64,
            "Query relayed"
        );

        Ok(())
    }

    /// End the client's view of the stream after a partial frame so it sees
    /// EOF instead of waiting on bytes that will never come.
    async fn close_poisoned<W>(&self, writer: &ResponseWriter<W>, peer: SocketAddr)
    where
        W: AsyncWrite + Unpin + Send,
    {
        match tokio::time::timeout(self.timeout, writer.shutdown()).await {
            Ok(Ok(())) => debug!(peer = %peer, "Closed response stream after incomplete frame"),
            Ok(Err(e)) => debug!(peer = %peer, error = %e, "Writer shutdown failed"),
            Err(_) => debug!(peer = %peer, "Writer shutdown timed out"),
        }
    }
}
