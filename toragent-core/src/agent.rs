//! High-level agent combining a supervised Tor process and a tunnel

use crate::config::{Config, TunnelConfig};
use crate::error::{AgentError, Result};
use crate::ports::PortAllocator;
use crate::process::{ManagedProcess, ProcessSupervisor};
use crate::workdir::WorkDir;
use std::net::{IpAddr, SocketAddr};
use toragent_tunnel::{ConnectionTunnel, SecureLayer, TunnelRequest, TunnelResult};

/// Options for [`Agent::create`]
#[derive(Debug, Clone, Default)]
pub struct AgentOptions {
    /// `common.verbose` adds info-level progress logging
    pub config: Config,
}

/// A private Tor instance and a tunnel through it
#[derive(Debug)]
pub struct Agent {
    process: ManagedProcess,
    tunnel: ConnectionTunnel,
    proxy: SocketAddr,
    // Dropped after the process handle
    workdir: WorkDir,
}

impl Agent {
    /// Allocate a port and data directory, spawn Tor and wait for it to
    /// bootstrap, then prepare the tunnel
    pub async fn create(options: AgentOptions) -> Result<Self> {
        let AgentOptions { config } = options;
        let verbose = config.common.verbose;

        let socks_host: IpAddr = config.tor.socks_host.parse().map_err(|_| {
            AgentError::InvalidConfig(format!(
                "tor.socks_host {:?} is not an IP address",
                config.tor.socks_host
            ))
        })?;
        let tunnel = build_tunnel(&config.tunnel)?;

        let port = PortAllocator::allocate_one()?;
        let workdir = WorkDir::create(config.tor.data_dir_base.as_deref())?;

        if verbose {
            tracing::info!("Spawning Tor on port {}", port);
        }
        let bootstrap_timeout = config.tor.bootstrap_timeout();
        let process = ProcessSupervisor::new(config.tor)
            .spawn(port, workdir.path(), bootstrap_timeout)
            .await?;
        if verbose {
            tracing::info!(
                "Tor spawned with pid {} listening on {}",
                process.pid(),
                process.port()
            );
        }

        Ok(Self {
            process,
            tunnel,
            proxy: SocketAddr::new(socks_host, port),
            workdir,
        })
    }

    pub async fn rotate_address(&self) -> Result<()> {
        self.process.rotate_address().await
    }

    pub async fn destroy(&self) -> Result<()> {
        self.process.destroy().await
    }

    /// Open a connection to the request's target through Tor
    pub async fn connect(&self, request: &TunnelRequest) -> Result<TunnelResult> {
        Ok(self.tunnel.connect(request, self.proxy).await?)
    }

    pub fn process(&self) -> &ManagedProcess {
        &self.process
    }

    /// The SOCKS5 endpoint Tor listens on
    pub fn proxy_endpoint(&self) -> SocketAddr {
        self.proxy
    }

    pub fn data_dir(&self) -> &std::path::Path {
        self.workdir.path()
    }
}

fn build_tunnel(config: &TunnelConfig) -> Result<ConnectionTunnel> {
    let tls = if config.accept_invalid_certs {
        tracing::warn!("Certificate verification is disabled for tunneled connections");
        SecureLayer::accept_invalid_certs()?
    } else if let Some(ca_file) = &config.ca_file {
        SecureLayer::from_pem_file(ca_file)?
    } else {
        SecureLayer::platform()?
    };

    Ok(ConnectionTunnel::new(tls).with_connect_timeout(config.connect_timeout()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::{fake_tor_config, FakeTor};
    use crate::process::ProcessState;
    use tempfile::TempDir;
    use toragent_tunnel::{Protocol, TunnelError};

    fn options(scripts: &TempDir, data_base: &TempDir, tor: FakeTor) -> AgentOptions {
        let mut config = Config::default();
        config.tor = fake_tor_config(&tor.write(scripts.path()));
        config.tor.data_dir_base = Some(data_base.path().to_path_buf());
        config.tunnel.accept_invalid_certs = true;
        config.common.verbose = true;
        AgentOptions { config }
    }

    #[tokio::test]
    async fn test_create_and_destroy() {
        let scripts = TempDir::new().unwrap();
        let data_base = TempDir::new().unwrap();
        let agent = Agent::create(options(&scripts, &data_base, FakeTor::Ready))
            .await
            .unwrap();

        let endpoint = agent.proxy_endpoint();
        assert!(endpoint.ip().is_loopback());
        assert_eq!(endpoint.port(), agent.process().port());
        assert!(agent.data_dir().starts_with(data_base.path()));
        assert_eq!(agent.process().state(), ProcessState::Ready);

        agent.rotate_address().await.unwrap();
        agent.destroy().await.unwrap();
        assert_eq!(agent.process().state(), ProcessState::Terminated);
    }

    #[tokio::test]
    async fn test_connect_without_socks_listener() {
        // The fake never opens its SOCKS port
        let scripts = TempDir::new().unwrap();
        let data_base = TempDir::new().unwrap();
        let agent = Agent::create(options(&scripts, &data_base, FakeTor::Ready))
            .await
            .unwrap();

        let request = TunnelRequest::new("example.com", 80, Protocol::Plain);
        let result = agent.connect(&request).await;
        assert!(matches!(
            result,
            Err(AgentError::Tunnel(TunnelError::ProxyUnreachable { .. }))
        ));

        agent.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_fails_when_tor_exits() {
        let scripts = TempDir::new().unwrap();
        let data_base = TempDir::new().unwrap();
        let result = Agent::create(options(&scripts, &data_base, FakeTor::ExitsWith(1))).await;
        assert!(matches!(
            result,
            Err(AgentError::ProcessExitedEarly { exit_code: Some(1) })
        ));
    }

    #[tokio::test]
    async fn test_rejects_non_ip_socks_host() {
        let mut options = AgentOptions::default();
        options.config.tor.socks_host = "localhost".to_string();
        let result = Agent::create(options).await;
        assert!(matches!(result, Err(AgentError::InvalidConfig(_))));
    }
}
