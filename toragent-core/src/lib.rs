//! Core library for toragent
//!
//! Supervises a private Tor process (bootstrap, address rotation, clean
//! shutdown) and pairs it with a SOCKS5/TLS tunnel through that process.

pub mod agent;
pub mod args;
pub mod config;
pub mod error;
pub mod ports;
pub mod process;
pub mod workdir;

pub use agent::{Agent, AgentOptions};
pub use args::CommonArgs;
pub use config::{Config, ConfigLoader, TorConfig, TunnelConfig};
pub use error::{AgentError, Result};
pub use ports::PortAllocator;
pub use process::{ManagedProcess, ProcessState, ProcessSupervisor};
pub use workdir::WorkDir;
