//! Configuration file loading and validation

use super::schema::Config;
use crate::error::{AgentError, Result};
use std::env;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Find user config by checking environment and standard locations
    pub fn find_user_config() -> Option<PathBuf> {
        // 1. $TORAGENT_CONFIG
        if let Ok(path) = env::var("TORAGENT_CONFIG") {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }

        // 2. $XDG_CONFIG_HOME/toragent/config.toml
        if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
            let p = PathBuf::from(xdg).join("toragent/config.toml");
            if p.exists() {
                return Some(p);
            }
        }

        // 3. ~/.config/toragent/config.toml
        if let Ok(home) = env::var("HOME") {
            let p = PathBuf::from(home).join(".config/toragent/config.toml");
            if p.exists() {
                return Some(p);
            }
        }

        None
    }

    /// Load config from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| AgentError::ConfigLoad {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load config from an explicit path, the user config, or built-in defaults
    /// Priority: explicit > user > defaults
    pub fn load_or_default(path: Option<PathBuf>) -> Result<Config> {
        Self::load_with_overrides(path, |_| {})
    }

    /// Like `load_or_default`, applying `overrides` before validation
    pub fn load_with_overrides(
        path: Option<PathBuf>,
        overrides: impl FnOnce(&mut Config),
    ) -> Result<Config> {
        let mut config = match path.or_else(Self::find_user_config) {
            Some(p) => {
                tracing::debug!("Loading config from {:?}", p);
                Self::load_from_file(&p)?
            }
            None => {
                tracing::debug!("No config file found, using defaults");
                Config::default()
            }
        };

        overrides(&mut config);
        Self::validate(&config)?;
        Ok(config)
    }

    /// Reject configurations the supervisor cannot act on
    pub fn validate(config: &Config) -> Result<()> {
        let tor = &config.tor;

        if tor.binary.as_os_str().is_empty() {
            return Err(AgentError::InvalidConfig("tor.binary is empty".to_string()));
        }

        for (name, marker) in [
            ("bootstrap", &tor.markers.bootstrap),
            ("reload", &tor.markers.reload),
            ("exit", &tor.markers.exit),
        ] {
            if marker.is_empty() {
                return Err(AgentError::InvalidConfig(format!(
                    "tor.markers.{name} is empty"
                )));
            }
        }

        if tor.socks_host.parse::<IpAddr>().is_err() {
            return Err(AgentError::InvalidConfig(format!(
                "tor.socks_host is not an IP address: {}",
                tor.socks_host
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tor.binary, PathBuf::from("tor"));
        assert_eq!(config.tor.bootstrap_timeout(), Duration::from_secs(30));
        assert_eq!(config.tor.attempt_limit(), Some(10));
        assert_eq!(config.tor.markers.bootstrap, "Done");
        assert!(!config.common.verbose);
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[common]
verbose = true

[tor]
binary = "/usr/sbin/tor"
bootstrap_timeout_ms = 5000
max_spawn_attempts = 0

[tor.markers]
exit = "Catching signal TERM, exiting cleanly"

[tunnel]
accept_invalid_certs = true
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.common.verbose);
        assert_eq!(config.tor.binary, PathBuf::from("/usr/sbin/tor"));
        assert_eq!(config.tor.attempt_limit(), None);
        assert_eq!(config.tor.markers.exit, "Catching signal TERM, exiting cleanly");
        // Unset markers keep their defaults
        assert_eq!(config.tor.markers.reload, "Received reload signal");
        assert_eq!(config.tor.settle_delay(), Duration::from_secs(1));
        assert!(config.tunnel.accept_invalid_certs);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tor]\nsettle_delay_ms = 10").unwrap();

        let config = ConfigLoader::load_or_default(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.tor.settle_delay(), Duration::from_millis(10));
    }

    #[test]
    fn test_overrides_are_validated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tor]\nsocks_host = \"localhost\"").unwrap();
        let path = file.path().to_path_buf();

        // Invalid on disk, fixed by the override
        let config = ConfigLoader::load_with_overrides(Some(path.clone()), |c| {
            c.tor.socks_host = "127.0.0.1".to_string();
        })
        .unwrap();
        assert_eq!(config.tor.socks_host, "127.0.0.1");

        let result = ConfigLoader::load_with_overrides(Some(path), |c| {
            c.tor.socks_host = "127.0.0.1".to_string();
            c.tor.binary = PathBuf::new();
        });
        assert!(matches!(result, Err(AgentError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ConfigLoader::load_from_file("/nonexistent/toragent.toml");
        assert!(matches!(result, Err(AgentError::ConfigLoad { .. })));
    }

    #[test]
    fn test_validate_rejects_empty_marker() {
        let mut config = Config::default();
        config.tor.markers.reload.clear();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(AgentError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_hostname() {
        let mut config = Config::default();
        config.tor.socks_host = "localhost".to_string();
        assert!(ConfigLoader::validate(&config).is_err());
    }
}
