//! Common CLI argument structure for toragent commands

use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

/// Arguments shared by every toragent command
#[derive(Parser, Debug, Default)]
pub struct CommonArgs {
    /// Configuration file (TOML format)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log progress and Tor output to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Path to the tor binary
    #[arg(long, global = true, value_name = "PATH")]
    pub tor_binary: Option<PathBuf>,

    /// How long to wait for Tor to bootstrap before relaunching it
    #[arg(long, global = true, value_name = "MS")]
    pub bootstrap_timeout_ms: Option<u64>,

    /// Launches to try before giving up (0 = unlimited)
    #[arg(long, global = true, value_name = "N")]
    pub max_spawn_attempts: Option<u32>,
}

impl CommonArgs {
    /// Override file values with whatever was given on the command line
    pub fn apply(&self, config: &mut Config) {
        if self.verbose {
            config.common.verbose = true;
        }
        if let Some(binary) = &self.tor_binary {
            config.tor.binary = binary.clone();
        }
        if let Some(ms) = self.bootstrap_timeout_ms {
            config.tor.bootstrap_timeout_ms = ms;
        }
        if let Some(n) = self.max_spawn_attempts {
            config.tor.max_spawn_attempts = n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let args = CommonArgs::parse_from([
            "toragent",
            "-v",
            "--tor-binary",
            "/opt/tor/bin/tor",
            "--max-spawn-attempts",
            "0",
        ]);

        let mut config = Config::default();
        args.apply(&mut config);

        assert!(config.common.verbose);
        assert_eq!(config.tor.binary, PathBuf::from("/opt/tor/bin/tor"));
        assert_eq!(config.tor.max_spawn_attempts, 0);
        assert_eq!(config.tor.attempt_limit(), None);
        // Untouched values keep their defaults
        assert_eq!(config.tor.bootstrap_timeout_ms, 30_000);
    }

    #[test]
    fn test_apply_nothing() {
        let args = CommonArgs::default();
        let mut config = Config::default();
        config.common.verbose = true;
        args.apply(&mut config);
        assert!(config.common.verbose);
        assert_eq!(config.tor.binary, PathBuf::from("tor"));
    }
}
