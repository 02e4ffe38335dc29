//! Tunnel targets and server name resolution

use crate::error::{Result, TunnelError};
use url::Url;

/// Whether a TLS stage follows the SOCKS5 stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Plain,
    Secure,
}

impl Protocol {
    /// Map a URL scheme to a protocol
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "http" | "ws" => Some(Protocol::Plain),
            "https" | "wss" => Some(Protocol::Secure),
            _ => None,
        }
    }

    pub fn is_secure(self) -> bool {
        matches!(self, Protocol::Secure)
    }
}

/// A destination to reach through the proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelRequest {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    /// Overrides the name presented during the TLS handshake
    pub server_name: Option<String>,
}

impl TunnelRequest {
    pub fn new(host: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self {
            host: host.into(),
            port,
            protocol,
            server_name: None,
        }
    }

    /// Set an explicit SNI name
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Build a request from an absolute URL
    ///
    /// The scheme picks the protocol and supplies the default port.
    pub fn from_url(url: &Url) -> Result<Self> {
        let protocol = Protocol::from_scheme(url.scheme()).ok_or_else(|| {
            TunnelError::InvalidTarget(format!("unsupported scheme: {}", url.scheme()))
        })?;
        let host = url
            .host_str()
            .ok_or_else(|| TunnelError::InvalidTarget(format!("no host in {url}")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| TunnelError::InvalidTarget(format!("no port for {url}")))?;

        Ok(Self::new(host, port, protocol))
    }

    /// Host to hand to the proxy, without any embedded port
    pub fn target_host(&self) -> &str {
        strip_port(&self.host)
    }

    /// Name presented for SNI and certificate validation
    pub fn resolved_server_name(&self) -> &str {
        match &self.server_name {
            Some(name) => name,
            None => self.target_host(),
        }
    }
}

/// Strip a trailing `:port` from a host string
///
/// Bracketed IPv6 literals lose their brackets. Bare IPv6 literals are
/// returned untouched since their colons are not port separators.
fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.find(']') {
            Some(end) => &rest[..end],
            None => host,
        };
    }

    match host.rsplit_once(':') {
        Some((name, port))
            if !name.contains(':') && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            name
        }
        _ => host,
    }
}
