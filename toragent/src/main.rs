//! toragent: run a private Tor instance and tunnel connections through it

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};
use toragent_core::{Agent, AgentOptions, CommonArgs, Config, ConfigLoader};
use toragent_tunnel::TunnelRequest;
use url::Url;

#[derive(Parser, Debug)]
#[command(
    name = "toragent",
    about = "Supervise a private Tor instance and tunnel connections through it",
    version
)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Keep a Tor instance running (SIGHUP rotates the exit address)
    Run,

    /// Connect to URL through Tor and pipe stdin/stdout over the connection
    Connect {
        /// Target, e.g. https://example.com or http://host.onion:8080
        url: Url,

        /// TLS server name, when it differs from the URL host
        #[arg(long, value_name = "NAME")]
        server_name: Option<String>,

        /// Skip certificate verification
        #[arg(long)]
        insecure: bool,

        /// Trust the PEM certificates in this file as well
        #[arg(long, value_name = "PATH")]
        ca_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging - TORAGENT_LOG wins over the verbose flag
    let filter = std::env::var("TORAGENT_LOG")
        .unwrap_or_else(|_| if args.common.verbose { "debug" } else { "warn" }.to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut config =
        ConfigLoader::load_with_overrides(args.common.config.clone(), |c| args.common.apply(c))
            .context("Failed to load configuration")?;

    match args.command {
        Command::Run => run(config).await,
        Command::Connect {
            url,
            server_name,
            insecure,
            ca_file,
        } => {
            if insecure {
                config.tunnel.accept_invalid_certs = true;
            }
            if ca_file.is_some() {
                config.tunnel.ca_file = ca_file;
            }
            connect(config, &url, server_name).await
        }
    }
}

async fn create_agent(config: Config) -> Result<Agent> {
    Agent::create(AgentOptions { config })
        .await
        .context("Failed to start Tor")
}

async fn run(config: Config) -> Result<()> {
    let agent = create_agent(config).await?;
    println!("socks5://{}", agent.proxy_endpoint());

    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    loop {
        tokio::select! {
            _ = hangup.recv() => {
                if let Err(e) = agent.rotate_address().await {
                    tracing::error!("Address rotation failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
            _ = terminate.recv() => break,
        }
    }

    tracing::info!("Shutting down Tor");
    agent.destroy().await.context("Failed to stop Tor")
}

async fn connect(config: Config, url: &Url, server_name: Option<String>) -> Result<()> {
    let mut request = TunnelRequest::from_url(url).context("Unsupported URL")?;
    if let Some(name) = server_name {
        request = request.with_server_name(name);
    }

    let agent = create_agent(config).await?;
    let piped = pipe_stdio(&agent, &request).await;
    let destroyed = agent.destroy().await.context("Failed to stop Tor");

    piped?;
    destroyed
}

async fn pipe_stdio(agent: &Agent, request: &TunnelRequest) -> Result<()> {
    let mut tunnel = agent
        .connect(request)
        .await
        .with_context(|| format!("Failed to reach {}:{}", request.host, request.port))?;

    match tunnel.peer_verified {
        Some(false) => tracing::warn!("Server certificate was not verified"),
        Some(true) => tracing::debug!("Server certificate verified"),
        None => {}
    }

    let mut stdio = tokio::io::join(tokio::io::stdin(), tokio::io::stdout());
    let (sent, received) = tokio::io::copy_bidirectional(&mut stdio, &mut tunnel.stream)
        .await
        .context("Connection closed with an error")?;
    tracing::debug!("Sent {} bytes, received {} bytes", sent, received);

    Ok(())
}
