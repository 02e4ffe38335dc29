//! Layered connection pipeline
//!
//! A tunnel is built in stages, each consuming the previous stream: a TCP
//! connection to the proxy, a SOCKS5 CONNECT through it, and for secure
//! targets a TLS session on top.

use crate::error::Result;
use crate::request::{Protocol, TunnelRequest};
use crate::socks;
use crate::tls::SecureLayer;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tracing::debug;

/// Byte stream handed back by a completed tunnel
pub enum TunnelStream {
    /// SOCKS5-tunneled TCP socket
    Plain(TcpStream),
    /// TLS session running over the SOCKS5-tunneled socket
    Secure(Box<TlsStream<TcpStream>>),
}

impl TunnelStream {
    pub fn is_secure(&self) -> bool {
        matches!(self, TunnelStream::Secure(_))
    }
}

impl std::fmt::Debug for TunnelStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TunnelStream::Plain(s) => f.debug_tuple("Plain").field(s).finish(),
            TunnelStream::Secure(s) => f.debug_tuple("Secure").field(s.get_ref().0).finish(),
        }
    }
}

impl AsyncRead for TunnelStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            TunnelStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            TunnelStream::Secure(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for TunnelStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            TunnelStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            TunnelStream::Secure(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            TunnelStream::Plain(s) => Pin::new(s).poll_flush(cx),
            TunnelStream::Secure(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            TunnelStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            TunnelStream::Secure(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Result of a successful `ConnectionTunnel::connect`
#[derive(Debug)]
pub struct TunnelResult {
    pub stream: TunnelStream,
    /// `None` when no TLS stage ran
    pub peer_verified: Option<bool>,
}

/// Opens connections to targets through a SOCKS5 proxy
#[derive(Debug, Clone)]
pub struct ConnectionTunnel {
    tls: SecureLayer,
    connect_timeout: Option<Duration>,
}

impl ConnectionTunnel {
    pub fn new(tls: SecureLayer) -> Self {
        Self {
            tls,
            connect_timeout: None,
        }
    }

    /// Bound the TCP connect to the proxy
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Reach `request`'s target through the proxy at `proxy`
    ///
    /// Secure requests get a TLS handshake over the tunneled socket. The
    /// caller owns the returned stream outright; nothing is pooled.
    pub async fn connect(&self, request: &TunnelRequest, proxy: SocketAddr) -> Result<TunnelResult> {
        let host = request.target_host();
        let socket = socks::connect(proxy, host, request.port, self.connect_timeout).await?;

        match request.protocol {
            Protocol::Plain => Ok(TunnelResult {
                stream: TunnelStream::Plain(socket),
                peer_verified: None,
            }),
            Protocol::Secure => {
                let server_name = request.resolved_server_name();
                let tls = self.tls.handshake(socket, server_name).await?;
                debug!("TLS established with {} via {}", server_name, proxy);

                Ok(TunnelResult {
                    stream: TunnelStream::Secure(Box::new(tls)),
                    peer_verified: Some(self.tls.verifies_peer()),
                })
            }
        }
    }
}
