//! DoT Relay Infrastructure Layer
pub mod dns;
pub mod tls;
