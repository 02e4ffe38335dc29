//! Error types for tunnel operations

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TunnelError>;

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("Failed to reach SOCKS5 proxy at {proxy}: {source}")]
    ProxyUnreachable {
        proxy: SocketAddr,
        source: std::io::Error,
    },

    #[error("SOCKS5 negotiation failed ({}): {source}", describe_reason(.reason))]
    NegotiationFailed {
        /// Reply code reported by the proxy, if it sent a well-formed reply
        reason: Option<u8>,
        source: tokio_socks::Error,
    },

    #[error("TLS handshake with {server_name} failed: {source}")]
    SecureHandshakeFailed {
        server_name: String,
        source: std::io::Error,
    },

    #[error("Invalid server name: {0}")]
    InvalidServerName(String),

    #[error("Invalid tunnel target: {0}")]
    InvalidTarget(String),

    #[error("Failed to load trust anchors from {path}: {source}")]
    TrustAnchors {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TunnelError {
    /// SOCKS5 reply code carried by a negotiation failure
    pub fn reason_code(&self) -> Option<u8> {
        match self {
            TunnelError::NegotiationFailed { reason, .. } => *reason,
            _ => None,
        }
    }
}

fn describe_reason(reason: &Option<u8>) -> String {
    match reason {
        Some(code) => format!("reply code {code:#04x}"),
        None => "no reply code".to_string(),
    }
}
