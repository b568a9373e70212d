#![allow(dead_code)]
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};

/// What the mock upstream does with one datagram.
pub enum Reply {
    Respond { bytes: Vec<u8>, delay: Duration },
    Ignore,
}

type Responder = dyn Fn(&[u8]) -> Reply + Send + Sync;

/// UDP resolver stand-in bound to 127.0.0.1 on an ephemeral port.
///
/// Every received datagram is forwarded to `received()` and answered by the
/// responder in its own task, so slow replies never hold back fast ones.
pub struct MockUpstream {
    addr: SocketAddr,
    received: mpsc::UnboundedReceiver<Vec<u8>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockUpstream {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&[u8]) -> Reply + Send + Sync + 'static,
    {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let addr = socket.local_addr().unwrap();
        let responder: Arc<Responder> = Arc::new(responder);

        let (received_tx, received) = mpsc::unbounded_channel();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 65535];

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = socket.recv_from(&mut buf) => {
                        let Ok((len, peer)) = result else { continue };
                        let query = buf[..len].to_vec();
                        let _ = received_tx.send(query.clone());

                        if let Reply::Respond { bytes, delay } = responder(&query) {
                            let socket = Arc::clone(&socket);
                            tokio::spawn(async move {
                                tokio::time::sleep(delay).await;
                                let _ = socket.send_to(&bytes, peer).await;
                            });
                        }
                    }
                }
            }
        });

        Self {
            addr,
            received,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Answers every query with `build_mock_response`, no delay.
    pub async fn answering() -> Self {
        Self::start(|query| Reply::Respond {
            bytes: build_mock_response(query),
            delay: Duration::ZERO,
        })
        .await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn next_query(&mut self) -> Vec<u8> {
        tokio::time::timeout(Duration::from_secs(5), self.received.recv())
            .await
            .expect("upstream received nothing")
            .expect("upstream channel closed")
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Name pointer to the question, A/IN, TTL 60, 93.184.216.34.
#[rustfmt::skip]
const ANSWER_RECORD: [u8; 16] = [
    0xc0, 0x0c,
    0x00, 0x01,
    0x00, 0x01,
    0x00, 0x00, 0x00, 0x3c,
    0x00, 0x04,
    93, 184, 216, 34,
];

/// Minimal A answer for the question in `query`: header copied with QR set,
/// question echoed, one 93.184.216.34 record appended.
pub fn build_mock_response(query: &[u8]) -> Vec<u8> {
    if query.len() < 12 {
        return query.to_vec();
    }

    let mut response = Vec::with_capacity(query.len() + 16);

    response.extend_from_slice(&query[0..2]);
    response.push(0x81);
    response.push(0x80);
    response.extend_from_slice(&query[4..6]);
    response.extend_from_slice(&[0x00, 0x01]);
    response.extend_from_slice(&[0x00, 0x00]);
    response.extend_from_slice(&[0x00, 0x00]);
    response.extend_from_slice(&query[12..]);

    response.extend_from_slice(&ANSWER_RECORD);

    response
}
