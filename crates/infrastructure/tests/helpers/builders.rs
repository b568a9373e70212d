#![allow(dead_code)]
use dot_relay_domain::Config;
use dot_relay_infrastructure::dns::framing::{decode_frame, encode_frame};
use dot_relay_infrastructure::dns::DotServer;
use dot_relay_infrastructure::tls;
use rustls::pki_types::{CertificateDer, ServerName};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;

pub struct ConfigBuilder;

impl ConfigBuilder {
    /// Loopback listener on an ephemeral port forwarding to `upstream`.
    pub fn local(upstream: SocketAddr) -> Config {
        let mut config = Config::default();
        config.server.bind_address = "127.0.0.1".to_string();
        config.server.port = 0;
        config.server.idle_timeout_secs = 0;
        config.upstream.address = upstream.to_string();
        config.upstream.timeout_secs = 1;
        config
    }
}

/// Self-signed `localhost` certificate written to temporary PEM files.
pub struct TestCerts {
    cert_der: CertificateDer<'static>,
    cert_file: NamedTempFile,
    key_file: NamedTempFile,
}

impl TestCerts {
    pub fn generate() -> Self {
        let certified =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();

        Self {
            cert_der: certified.cert.der().clone(),
            cert_file: pem_file(&certified.cert.pem()),
            key_file: pem_file(&certified.key_pair.serialize_pem()),
        }
    }

    pub fn apply(&self, config: &mut Config) {
        config.tls.cert_path = self.cert_file.path().to_string_lossy().into_owned();
        config.tls.key_path = self.key_file.path().to_string_lossy().into_owned();
    }

    pub fn connector(&self) -> TlsConnector {
        let mut roots = rustls::RootCertStore::empty();
        roots.add(self.cert_der.clone()).unwrap();

        let config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::aws_lc_rs::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();

        TlsConnector::from(Arc::new(config))
    }
}

fn pem_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

/// A relay running in the background with its own shutdown token.
pub struct RunningRelay {
    pub addr: SocketAddr,
    pub shutdown: CancellationToken,
    pub serve: JoinHandle<Result<(), dot_relay_domain::DomainError>>,
    pub drain: dot_relay_infrastructure::dns::DrainHandle,
    pub stats: Arc<dot_relay_infrastructure::dns::RelayStats>,
}

impl RunningRelay {
    pub async fn start(config: &Config) -> Self {
        let tls_config = tls::load_server_config(&config.tls).unwrap();
        let server = DotServer::bind(config, tls_config).await.unwrap();
        Self::spawn(server)
    }

    pub fn spawn(server: DotServer) -> Self {
        let addr = server.local_addr();
        let drain = server.drain_handle();
        let stats = server.stats();
        let shutdown = CancellationToken::new();
        let serve = tokio::spawn(server.serve(shutdown.clone()));

        Self {
            addr,
            shutdown,
            serve,
            drain,
            stats,
        }
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), self.serve)
            .await
            .expect("serve did not return after shutdown")
            .unwrap()
            .unwrap();
    }
}

/// DoT client talking to a relay started by the tests.
pub struct DotClient {
    stream: TlsStream<TcpStream>,
}

impl DotClient {
    pub async fn connect(addr: SocketAddr, certs: &TestCerts) -> Self {
        let tcp = TcpStream::connect(addr).await.unwrap();
        let server_name = ServerName::try_from("localhost").unwrap();
        let stream = certs.connector().connect(server_name, tcp).await.unwrap();
        Self { stream }
    }

    pub async fn send(&mut self, query: &[u8]) {
        let frame = encode_frame(query).unwrap();
        self.stream.write_all(&frame).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    pub async fn recv(&mut self) -> Vec<u8> {
        tokio::time::timeout(Duration::from_secs(5), decode_frame(&mut self.stream, 65535))
            .await
            .expect("no response within 5s")
            .unwrap()
            .to_vec()
    }

    /// Read with a deadline; `None` if nothing complete arrived in time.
    pub async fn try_recv(
        &mut self,
        wait: Duration,
    ) -> Option<Result<Vec<u8>, dot_relay_domain::DomainError>> {
        tokio::time::timeout(wait, decode_frame(&mut self.stream, 65535))
            .await
            .ok()
            .map(|r| r.map(|b| b.to_vec()))
    }
}

/// Standard query for `example.io` A, 28 bytes on the wire.
pub fn example_query(id: u16) -> Vec<u8> {
    let mut query = Vec::with_capacity(28);
    query.extend_from_slice(&id.to_be_bytes());
    query.extend_from_slice(&[0x01, 0x00]);
    query.extend_from_slice(&[0x00, 0x01]);
    query.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    query.extend_from_slice(b"\x07example\x02io\x00");
    query.extend_from_slice(&[0x00, 0x01]);
    query.extend_from_slice(&[0x00, 0x01]);
    query
}
