use serde::{Deserialize, Serialize};

/// Locations of the PEM encoded certificate chain and private key.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    #[serde(default = "default_cert_path")]
    pub cert_path: String,

    #[serde(default = "default_key_path")]
    pub key_path: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: default_cert_path(),
            key_path: default_key_path(),
        }
    }
}

fn default_cert_path() -> String {
    "site.crt".to_string()
}

fn default_key_path() -> String {
    "site.key".to_string()
}
