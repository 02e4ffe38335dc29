//! Configuration system for toragent
//!
//! - Config: Tor supervision and tunnel settings, loaded from TOML
//! - ConfigLoader: file discovery, loading and validation

pub mod loader;
pub mod schema;

// Re-export commonly used types
pub use loader::ConfigLoader;
pub use schema::{CommonConfig, Config, Markers, TorConfig, TunnelConfig};
