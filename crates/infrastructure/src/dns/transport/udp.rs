//! UDP Transport for DNS queries (RFC 1035 §4.2.1)
//!
//! Every exchange gets its own ephemeral socket, connected to the upstream so
//! the kernel discards datagrams from any other source. The socket is dropped
//! when the exchange ends, whatever the outcome. No transaction ID matching
//! is done here: the connected socket is the only correlation.

use super::{DnsTransport, TransportResponse};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dot_relay_domain::DomainError;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tracing::debug;

/// DNS over UDP transport
pub struct UdpTransport {
    server_addr: SocketAddr,
    max_response_size: usize,
}

impl UdpTransport {
    pub fn new(server_addr: SocketAddr, max_response_size: usize) -> Self {
        Self {
            server_addr,
            max_response_size,
        }
    }

    fn bind_addr(&self) -> SocketAddr {
        if self.server_addr.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        }
    }

    fn transport_error(&self, step: &str, e: io::Error) -> DomainError {
        if e.kind() == io::ErrorKind::ConnectionRefused {
            return DomainError::TransportConnectionRefused {
                server: self.server_addr.to_string(),
            };
        }
        DomainError::TransportError {
            server: self.server_addr.to_string(),
            reason: format!("{} failed: {}", step, e),
        }
    }

    fn timeout_error(&self) -> DomainError {
        DomainError::TransportTimeout {
            server: self.server_addr.to_string(),
        }
    }
}

#[async_trait]
impl DnsTransport for UdpTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError> {
        let started = Instant::now();

        let socket = UdpSocket::bind(self.bind_addr())
            .await
            .map_err(|e| self.transport_error("bind", e))?;
        socket
            .connect(self.server_addr)
            .await
            .map_err(|e| self.transport_error("connect", e))?;

        let bytes_sent = tokio::time::timeout(timeout, socket.send(message_bytes))
            .await
            .map_err(|_| self.timeout_error())?
            .map_err(|e| self.transport_error("send", e))?;

        debug!(
            server = %self.server_addr,
            bytes_sent = bytes_sent,
            "UDP query sent"
        );

        let mut recv_buf = BytesMut::zeroed(self.max_response_size);

        let bytes_received = tokio::time::timeout(timeout, socket.recv(&mut recv_buf))
            .await
            .map_err(|_| self.timeout_error())?
            .map_err(|e| self.transport_error("recv", e))?;

        recv_buf.truncate(bytes_received);

        debug!(
            server = %self.server_addr,
            bytes_received = bytes_received,
            "UDP response received"
        );

        Ok(TransportResponse {
            bytes: Bytes::from(recv_buf),
            elapsed: started.elapsed(),
        })
    }

    fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    fn protocol_name(&self) -> &'static str {
        "UDP"
    }
}
