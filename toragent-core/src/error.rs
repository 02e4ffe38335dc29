//! Error types for agent operations

use std::path::PathBuf;
use thiserror::Error;
use toragent_tunnel::TunnelError;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Failed to launch {binary}: {source}")]
    ProcessLaunch {
        binary: PathBuf,
        source: std::io::Error,
    },

    #[error("Proxy process exited before bootstrapping (exit code: {})", fmt_code(.exit_code))]
    ProcessExitedEarly { exit_code: Option<i32> },

    #[error("Proxy process on port {port} failed to bootstrap after {attempts} attempts (data dir {data_dir:?})")]
    SpawnAttemptsExhausted {
        attempts: u32,
        port: u16,
        data_dir: PathBuf,
    },

    #[error("No acknowledgement {marker:?} after sending {signal}")]
    ControlSignalTimeout { signal: String, marker: String },

    #[error("Failed to send {signal} to proxy process: {source}")]
    Signal {
        signal: String,
        source: nix::Error,
    },

    #[error("Proxy process is not running")]
    ProcessNotRunning,

    #[error("No free local port available")]
    NoFreePort,

    #[error("Failed to create data directory: {0}")]
    DataDir(#[source] std::io::Error),

    #[error("Failed to load config from {path}: {source}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Tunnel(#[from] TunnelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn fmt_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "killed by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exited_early_display() {
        let err = AgentError::ProcessExitedEarly { exit_code: Some(1) };
        assert!(err.to_string().contains("exit code: 1"));

        let err = AgentError::ProcessExitedEarly { exit_code: None };
        assert!(err.to_string().contains("killed by signal"));
    }
}
