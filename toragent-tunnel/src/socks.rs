//! SOCKS5 CONNECT stage
//!
//! Opens a TCP connection to the proxy and asks it to connect onward to the
//! target. Host names are passed through as domain names so resolution
//! happens on the far side of the proxy.

use crate::error::{Result, TunnelError};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_socks::tcp::Socks5Stream;
use tracing::debug;

/// Connect to `proxy` and negotiate a tunnel to `host:port`
///
/// On success the returned socket is a transparent byte pipe to the target.
/// Any failure drops the socket before returning.
pub async fn connect(
    proxy: SocketAddr,
    host: &str,
    port: u16,
    connect_timeout: Option<Duration>,
) -> Result<TcpStream> {
    debug!("Connecting to SOCKS5 proxy at {}", proxy);
    let socket = match connect_timeout {
        Some(limit) => tokio::time::timeout(limit, TcpStream::connect(proxy))
            .await
            .map_err(|_| TunnelError::ProxyUnreachable {
                proxy,
                source: std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connect to proxy timed out",
                ),
            })?,
        None => TcpStream::connect(proxy).await,
    }
    .map_err(|source| TunnelError::ProxyUnreachable { proxy, source })?;

    debug!("Requesting tunnel to {}:{}", host, port);
    let stream = Socks5Stream::connect_with_socket(socket, (host, port))
        .await
        .map_err(|source| TunnelError::NegotiationFailed {
            reason: reply_code(&source),
            source,
        })?;

    debug!("Tunnel established to {}:{}", host, port);
    Ok(stream.into_inner())
}

/// RFC 1928 reply code for a proxy-reported failure
///
/// Protocol errors (bad version, malformed reply, I/O) carry no code.
/// tokio-socks only models codes 0x01-0x08 and folds anything else into an
/// unrelated error without keeping the byte, so codes above 0x08 (Tor's
/// extended errors 0xF0-0xF7 among them) come back as `None`.
pub fn reply_code(err: &tokio_socks::Error) -> Option<u8> {
    use tokio_socks::Error as E;

    match err {
        E::GeneralSocksServerFailure => Some(0x01),
        E::ConnectionNotAllowedByRuleset => Some(0x02),
        E::NetworkUnreachable => Some(0x03),
        E::HostUnreachable => Some(0x04),
        E::ConnectionRefused => Some(0x05),
        E::TtlExpired => Some(0x06),
        E::CommandNotSupported => Some(0x07),
        E::AddressTypeNotSupported => Some(0x08),
        _ => None,
    }
}
