//! Spawning and bootstrap supervision of the Tor process

use super::control::{advance, ManagedProcess, ProcessActor};
use super::scanner::{LineScanner, ScanOutcome};
use super::signal::ChildGuard;
use super::state::ProcessState;
use crate::config::TorConfig;
use crate::error::{AgentError, Result};
use nix::sys::signal::Signal;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::process::{ChildStdout, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// How one launch attempt ended
enum Bootstrap {
    Ready,
    Exited(Option<i32>),
    TimedOut,
}

/// Launches Tor and waits for it to finish bootstrapping
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    config: TorConfig,
}

impl ProcessSupervisor {
    pub fn new(config: TorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TorConfig {
        &self.config
    }

    /// Spawn Tor on `port` with `data_dir` as its private state directory
    ///
    /// If the bootstrap marker does not appear within `bootstrap_timeout`
    /// the process is interrupted, reaped, and relaunched on the same port
    /// and directory, up to `max_spawn_attempts` launches in total.
    pub async fn spawn(
        &self,
        port: u16,
        data_dir: &Path,
        bootstrap_timeout: Duration,
    ) -> Result<ManagedProcess> {
        let (state, _) = watch::channel(ProcessState::Spawning { generation: 0 });
        let limit = self.config.attempt_limit();
        let mut generation = 0;

        loop {
            let (mut child, mut output) = match self.launch(port, data_dir) {
                Ok(launched) => launched,
                Err(e) => {
                    advance(&state, ProcessState::Failed { exit_code: None });
                    return Err(e);
                }
            };
            debug!(
                "Launched {:?} (pid {}, generation {}) on SOCKS port {}",
                self.config.binary,
                child.pid(),
                generation,
                port
            );

            let outcome = match self.await_bootstrap(&mut child, &mut output, bootstrap_timeout).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    advance(&state, ProcessState::Failed { exit_code: None });
                    return Err(e);
                }
            };

            match outcome {
                Bootstrap::Ready => {
                    info!("Process {} bootstrapped on port {}", child.pid(), port);
                    advance(&state, ProcessState::Ready);
                    return Ok(ProcessActor::start(
                        child,
                        output,
                        state,
                        port,
                        data_dir.to_path_buf(),
                        generation,
                        &self.config,
                    ));
                }
                Bootstrap::Exited(exit_code) => {
                    advance(&state, ProcessState::Failed { exit_code });
                    return Err(AgentError::ProcessExitedEarly { exit_code });
                }
                Bootstrap::TimedOut => {
                    warn!(
                        "Process {} did not bootstrap within {:?}",
                        child.pid(),
                        bootstrap_timeout
                    );
                    if let Err(e) = self.retire(child).await {
                        advance(&state, ProcessState::Failed { exit_code: None });
                        return Err(e);
                    }

                    let attempts = generation + 1;
                    if limit.is_some_and(|max| attempts >= max) {
                        advance(&state, ProcessState::Failed { exit_code: None });
                        return Err(AgentError::SpawnAttemptsExhausted {
                            attempts,
                            port,
                            data_dir: data_dir.to_path_buf(),
                        });
                    }

                    generation += 1;
                    advance(&state, ProcessState::Spawning { generation });
                }
            }
        }
    }

    fn launch(&self, port: u16, data_dir: &Path) -> Result<(ChildGuard, LineScanner<ChildStdout>)> {
        let mut cmd = Command::new(&self.config.binary);
        cmd.args(&self.config.args)
            .arg("--SOCKSPort")
            .arg(port.to_string())
            .arg("--DataDirectory")
            .arg(data_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        // Interrupt Tor if we die without shutting it down. The kernel ties
        // this to the spawning thread, not the process, so it only holds
        // while the runtime worker that ran `spawn` is alive; `ChildGuard`
        // covers the rest.
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                nix::sys::prctl::set_pdeathsig(Signal::SIGINT).map_err(std::io::Error::from)
            });
        }

        let mut child = cmd.spawn().map_err(|source| AgentError::ProcessLaunch {
            binary: self.config.binary.clone(),
            source,
        })?;
        let stdout = child.stdout.take().ok_or(AgentError::ProcessNotRunning)?;

        Ok((ChildGuard::new(child)?, LineScanner::new(stdout)))
    }

    async fn await_bootstrap<R: AsyncRead + Unpin>(
        &self,
        child: &mut ChildGuard,
        output: &mut LineScanner<R>,
        timeout: Duration,
    ) -> Result<Bootstrap> {
        let marker = &self.config.markers.bootstrap;

        match tokio::time::timeout(timeout, output.wait_for(marker)).await {
            Ok(Ok(ScanOutcome::Matched(_))) => Ok(Bootstrap::Ready),
            Ok(Ok(ScanOutcome::Closed)) => {
                let status = child.reap(self.config.control_timeout()).await?;
                debug!("Process {} exited during bootstrap with {}", child.pid(), status);
                Ok(Bootstrap::Exited(status.code()))
            }
            Ok(Err(e)) => {
                warn!("Reading output of process {} failed: {}", child.pid(), e);
                if let Err(e) = child.signal(Signal::SIGINT) {
                    debug!("Interrupting process {}: {}", child.pid(), e);
                }
                child.reap(self.config.settle_delay()).await?;
                Err(e.into())
            }
            Err(_) => Ok(Bootstrap::TimedOut),
        }
    }

    /// Interrupt a generation that failed to bootstrap and wait out the
    /// settle delay so its port is released before the next launch
    async fn retire(&self, mut child: ChildGuard) -> Result<()> {
        if let Err(e) = child.signal(Signal::SIGINT) {
            debug!("Interrupting process {}: {}", child.pid(), e);
        }
        let settle = self.config.settle_delay();
        child.reap(settle).await?;
        tokio::time::sleep(settle).await;
        Ok(())
    }
}
