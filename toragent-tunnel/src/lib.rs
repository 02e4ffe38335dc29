//! SOCKS5 tunneling with an optional TLS stage for toragent

pub mod error;
pub mod request;
pub mod socks;
pub mod tls;
pub mod tunnel;

// Re-export commonly used types
pub use error::{Result, TunnelError};
pub use request::{Protocol, TunnelRequest};
pub use tls::SecureLayer;
pub use tunnel::{ConnectionTunnel, TunnelResult, TunnelStream};
