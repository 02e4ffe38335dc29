//! Control of a bootstrapped proxy process
//!
//! A single task owns the child and its stdout. Control operations are
//! queued to it over a channel and served one at a time, so a rotate and a
//! destroy can never race to match each other's acknowledgement line.

use super::scanner::{LineScanner, ScanOutcome};
use super::signal::{is_alive, ChildGuard};
use super::state::ProcessState;
use crate::config::{Markers, TorConfig};
use crate::error::{AgentError, Result};
use nix::sys::signal::Signal;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::ChildStdout;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlOp {
    RotateAddress,
    Destroy,
}

struct ControlRequest {
    op: ControlOp,
    reply: oneshot::Sender<Result<()>>,
}

/// Move `state` to `next`, checking the transition
pub(crate) fn advance(state: &watch::Sender<ProcessState>, next: ProcessState) {
    let current = *state.borrow();
    debug_assert!(
        current.can_transition_to(&next),
        "illegal process transition {current} -> {next}"
    );
    debug!("Process state: {} -> {}", current, next);
    state.send_replace(next);
}

/// Handle to a running, bootstrapped proxy process
///
/// Clones share the same process. When the last clone is dropped the
/// process is shut down as if `destroy` had been called.
#[derive(Debug, Clone)]
pub struct ManagedProcess {
    pid: u32,
    port: u16,
    data_dir: PathBuf,
    generation: u32,
    state: watch::Receiver<ProcessState>,
    control: mpsc::Sender<ControlRequest>,
}

impl ManagedProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Number of bootstrap retries it took to reach `Ready`
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    /// Whether the OS process still exists
    pub fn is_running(&self) -> bool {
        is_alive(self.pid)
    }

    /// Ask Tor for new circuits (SIGHUP) and wait for the acknowledgement
    pub async fn rotate_address(&self) -> Result<()> {
        self.request(ControlOp::RotateAddress).await
    }

    /// Interrupt Tor, wait for it to exit cleanly, then let the port settle
    ///
    /// Calling this on an already terminated process succeeds.
    pub async fn destroy(&self) -> Result<()> {
        match self.request(ControlOp::Destroy).await {
            Err(AgentError::ProcessNotRunning) if self.state() == ProcessState::Terminated => Ok(()),
            other => other,
        }
    }

    async fn request(&self, op: ControlOp) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.control
            .send(ControlRequest { op, reply })
            .await
            .map_err(|_| AgentError::ProcessNotRunning)?;
        response.await.map_err(|_| AgentError::ProcessNotRunning)?
    }
}

/// Owner of a bootstrapped child process
pub(crate) struct ProcessActor {
    child: ChildGuard,
    output: LineScanner<ChildStdout>,
    requests: mpsc::Receiver<ControlRequest>,
    state: watch::Sender<ProcessState>,
    markers: Markers,
    settle_delay: Duration,
    control_timeout: Duration,
}

impl ProcessActor {
    /// Start serving control requests for a process that reached `Ready`
    pub(crate) fn start(
        child: ChildGuard,
        output: LineScanner<ChildStdout>,
        state: watch::Sender<ProcessState>,
        port: u16,
        data_dir: PathBuf,
        generation: u32,
        config: &TorConfig,
    ) -> ManagedProcess {
        let (control, requests) = mpsc::channel(8);
        let handle = ManagedProcess {
            pid: child.pid(),
            port,
            data_dir,
            generation,
            state: state.subscribe(),
            control,
        };

        let actor = ProcessActor {
            child,
            output,
            requests,
            state,
            markers: config.markers.clone(),
            settle_delay: config.settle_delay(),
            control_timeout: config.control_timeout(),
        };
        tokio::spawn(actor.run());

        handle
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                request = self.requests.recv() => {
                    let Some(request) = request else {
                        debug!("All handles to process {} dropped, shutting it down", self.child.pid());
                        if let Err(e) = self.shutdown().await {
                            warn!("Shutdown of process {} failed: {}", self.child.pid(), e);
                        }
                        break;
                    };

                    let result = match request.op {
                        ControlOp::RotateAddress => self.rotate_address().await,
                        ControlOp::Destroy => self.shutdown().await,
                    };
                    let _ = request.reply.send(result);
                }
                line = self.output.next_line(), if !self.output.is_closed() => {
                    // Lines are logged by the scanner; idle output is otherwise ignored
                    if !matches!(line, Ok(Some(_))) {
                        self.exited_unexpectedly().await;
                    }
                }
            }

            if self.state.borrow().is_terminal() {
                break;
            }
        }
    }

    async fn rotate_address(&mut self) -> Result<()> {
        let marker = self.markers.reload.clone();
        self.child.signal(Signal::SIGHUP)?;

        match self.await_marker(Signal::SIGHUP, &marker).await? {
            ScanOutcome::Matched(_) => {
                info!("Process {} acknowledged address rotation", self.child.pid());
                Ok(())
            }
            ScanOutcome::Closed => {
                self.exited_unexpectedly().await;
                Err(AgentError::ProcessNotRunning)
            }
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        let marker = self.markers.exit.clone();

        // Whatever happens to the interrupt, the process ends up reaped
        let acknowledged = match self.child.signal(Signal::SIGINT) {
            Ok(()) => match self.await_marker(Signal::SIGINT, &marker).await {
                Ok(ScanOutcome::Matched(_)) => Ok(()),
                Ok(ScanOutcome::Closed) => {
                    debug!("Output closed before exit acknowledgement");
                    Ok(())
                }
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        let reaped = self.child.reap(self.control_timeout).await;
        match &reaped {
            Ok(status) => debug!("Process {} exited with {}", self.child.pid(), status),
            Err(e) => warn!("Waiting for process {} failed: {}", self.child.pid(), e),
        }

        tokio::time::sleep(self.settle_delay).await;
        advance(&self.state, ProcessState::Terminated);

        acknowledged?;
        reaped?;
        Ok(())
    }

    async fn exited_unexpectedly(&mut self) {
        let status = self.child.reap(self.control_timeout).await;
        warn!("Process {} exited unexpectedly: {:?}", self.child.pid(), status);
        advance(&self.state, ProcessState::Terminated);
    }

    async fn await_marker(&mut self, signal: Signal, marker: &str) -> Result<ScanOutcome> {
        tokio::time::timeout(self.control_timeout, self.output.wait_for(marker))
            .await
            .map_err(|_| AgentError::ControlSignalTimeout {
                signal: signal.to_string(),
                marker: marker.to_string(),
            })?
            .map_err(AgentError::Io)
    }
}
