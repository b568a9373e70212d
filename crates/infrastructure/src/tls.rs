//! Server-side TLS setup for the DoT listener
//!
//! Credentials are PEM files: a certificate chain and a private key in
//! PKCS#8, PKCS#1 or SEC1 form. The resulting `ServerConfig` only speaks
//! TLS 1.3, only offers the P-256 key exchange group and picks the cipher
//! suite by its own preference order.

use dot_relay_domain::{DomainError, TlsConfig};
use rustls::crypto::aws_lc_rs;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Build the acceptor configuration from the configured PEM files.
pub fn load_server_config(tls: &TlsConfig) -> Result<Arc<ServerConfig>, DomainError> {
    let certs = load_certs(Path::new(&tls.cert_path))?;
    let key = load_private_key(Path::new(&tls.key_path))?;

    let config = build_server_config(certs, key)?;
    info!(
        cert = %tls.cert_path,
        key = %tls.key_path,
        "TLS credentials loaded"
    );
    Ok(config)
}

pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, DomainError> {
    let file = open(path)?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            DomainError::InvalidTlsCredentials(format!(
                "Failed to parse certificates in {}: {}",
                path.display(),
                e
            ))
        })?;

    if certs.is_empty() {
        return Err(DomainError::InvalidTlsCredentials(format!(
            "No certificates found in {}",
            path.display()
        )));
    }

    Ok(certs)
}

pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, DomainError> {
    let file = open(path)?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| {
            DomainError::InvalidTlsCredentials(format!(
                "Failed to parse private key in {}: {}",
                path.display(),
                e
            ))
        })?
        .ok_or_else(|| {
            DomainError::InvalidTlsCredentials(format!(
                "No private key found in {}",
                path.display()
            ))
        })
}

pub fn build_server_config(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<Arc<ServerConfig>, DomainError> {
    let mut config = ServerConfig::builder_with_provider(Arc::new(relay_crypto_provider()))
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| DomainError::InvalidTlsCredentials(format!("Unsupported TLS setup: {}", e)))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| {
            DomainError::InvalidTlsCredentials(format!("Invalid certificate or key: {}", e))
        })?;

    config.ignore_client_order = true;

    Ok(Arc::new(config))
}

/// Default provider narrowed to the P-256 key exchange group.
fn relay_crypto_provider() -> CryptoProvider {
    CryptoProvider {
        kx_groups: vec![aws_lc_rs::kx_group::SECP256R1],
        ..aws_lc_rs::default_provider()
    }
}

fn open(path: &Path) -> Result<File, DomainError> {
    File::open(path).map_err(|e| {
        DomainError::InvalidTlsCredentials(format!("Cannot open {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn pem_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn self_signed() -> (NamedTempFile, NamedTempFile) {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        (
            pem_file(&certified.cert.pem()),
            pem_file(&certified.key_pair.serialize_pem()),
        )
    }

    fn tls_config(cert: &NamedTempFile, key: &NamedTempFile) -> TlsConfig {
        TlsConfig {
            cert_path: cert.path().to_string_lossy().into_owned(),
            key_path: key.path().to_string_lossy().into_owned(),
        }
    }

    #[test]
    fn test_load_server_config_tls13_only() {
        let (cert, key) = self_signed();
        let config = load_server_config(&tls_config(&cert, &key)).unwrap();

        assert!(config.ignore_client_order);
        assert_eq!(config.crypto_provider().kx_groups.len(), 1);
        assert_eq!(
            config.crypto_provider().kx_groups[0].name(),
            rustls::NamedGroup::secp256r1
        );
    }

    #[test]
    fn test_missing_cert_file() {
        let (_, key) = self_signed();
        let tls = TlsConfig {
            cert_path: "/nonexistent/site.crt".to_string(),
            key_path: key.path().to_string_lossy().into_owned(),
        };

        let err = load_server_config(&tls).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTlsCredentials(_)));
        assert!(err.to_string().contains("/nonexistent/site.crt"));
    }

    #[test]
    fn test_empty_cert_file() {
        let cert = pem_file("");
        let err = load_certs(cert.path()).unwrap_err();
        assert!(err.to_string().contains("No certificates"));
    }

    #[test]
    fn test_key_file_without_key() {
        let (cert, _) = self_signed();
        // A certificate PEM holds no private key section.
        let err = load_private_key(cert.path()).unwrap_err();
        assert!(err.to_string().contains("No private key"));
    }
}
