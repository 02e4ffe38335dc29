//! Configuration schema types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete toragent configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub tor: TorConfig,
    #[serde(default)]
    pub tunnel: TunnelConfig,
}

/// Settings shared by every command
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CommonConfig {
    #[serde(default)]
    pub verbose: bool,
}

/// How the Tor process is launched and supervised
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TorConfig {
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
    /// Extra arguments placed before the SOCKS port and data directory flags
    #[serde(default)]
    pub args: Vec<String>,
    /// Address the SOCKS port is reached on
    #[serde(default = "default_socks_host")]
    pub socks_host: String,
    #[serde(default = "default_bootstrap_timeout_ms")]
    pub bootstrap_timeout_ms: u64,
    /// Total launches before giving up; 0 retries forever
    #[serde(default = "default_max_spawn_attempts")]
    pub max_spawn_attempts: u32,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_control_timeout_ms")]
    pub control_timeout_ms: u64,
    /// Parent for per-agent data directories (system temp dir if unset)
    #[serde(default)]
    pub data_dir_base: Option<PathBuf>,
    #[serde(default)]
    pub markers: Markers,
}

fn default_binary() -> PathBuf {
    PathBuf::from("tor")
}

fn default_socks_host() -> String {
    "127.0.0.1".to_string()
}

fn default_bootstrap_timeout_ms() -> u64 {
    30_000
}

fn default_max_spawn_attempts() -> u32 {
    10
}

fn default_settle_delay_ms() -> u64 {
    1_000
}

fn default_control_timeout_ms() -> u64 {
    30_000
}

impl Default for TorConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            args: Vec::new(),
            socks_host: default_socks_host(),
            bootstrap_timeout_ms: default_bootstrap_timeout_ms(),
            max_spawn_attempts: default_max_spawn_attempts(),
            settle_delay_ms: default_settle_delay_ms(),
            control_timeout_ms: default_control_timeout_ms(),
            data_dir_base: None,
            markers: Markers::default(),
        }
    }
}

impl TorConfig {
    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_millis(self.bootstrap_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }

    /// `None` when retries are unbounded
    pub fn attempt_limit(&self) -> Option<u32> {
        (self.max_spawn_attempts > 0).then_some(self.max_spawn_attempts)
    }
}

/// Substrings Tor prints on stdout at each lifecycle step
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Markers {
    #[serde(default = "default_bootstrap_marker")]
    pub bootstrap: String,
    #[serde(default = "default_reload_marker")]
    pub reload: String,
    #[serde(default = "default_exit_marker")]
    pub exit: String,
}

fn default_bootstrap_marker() -> String {
    "Done".to_string()
}

fn default_reload_marker() -> String {
    "Received reload signal".to_string()
}

fn default_exit_marker() -> String {
    "exiting cleanly".to_string()
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            bootstrap: default_bootstrap_marker(),
            reload: default_reload_marker(),
            exit: default_exit_marker(),
        }
    }
}

/// Settings for connections made through the proxy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TunnelConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Extra PEM certificates trusted alongside the platform store
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_connect_timeout_ms() -> u64 {
    60_000
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            ca_file: None,
            accept_invalid_certs: false,
        }
    }
}

impl TunnelConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
