//! Signal delivery and child ownership

use crate::error::{AgentError, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;
use tracing::{debug, warn};

/// Send `signal` to `pid`
pub fn send_signal(pid: u32, signal: Signal) -> Result<()> {
    #[allow(clippy::cast_possible_wrap)]
    kill(Pid::from_raw(pid as i32), signal).map_err(|source| AgentError::Signal {
        signal: signal.to_string(),
        source,
    })
}

/// Signal-0 probe: true while `pid` exists
pub fn is_alive(pid: u32) -> bool {
    #[allow(clippy::cast_possible_wrap)]
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Owns a running child; interrupts it if dropped while still alive
pub struct ChildGuard {
    child: Child,
    pid: u32,
}

impl ChildGuard {
    pub fn new(child: Child) -> Result<Self> {
        let pid = child.id().ok_or(AgentError::ProcessNotRunning)?;
        Ok(Self { child, pid })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn signal(&self, signal: Signal) -> Result<()> {
        send_signal(self.pid, signal)
    }

    /// Wait up to `grace` for the child to exit, then kill it
    pub async fn reap(&mut self, grace: Duration) -> std::io::Result<ExitStatus> {
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!("Process {} still running after {:?}, killing", self.pid, grace);
                self.child.start_kill()?;
                self.child.wait().await
            }
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            debug!("Interrupting process {} on drop", self.pid);
            let _ = send_signal(self.pid, Signal::SIGINT);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command;

    #[tokio::test]
    async fn test_reap_kills_stubborn_child() {
        // Ignores SIGINT, so only the kill fallback ends it
        let child = Command::new("sh")
            .arg("-c")
            .arg("trap '' INT; exec sleep 30")
            .spawn()
            .unwrap();
        let mut guard = ChildGuard::new(child).unwrap();
        let pid = guard.pid();
        assert!(is_alive(pid));

        guard.signal(Signal::SIGINT).unwrap();
        let status = guard.reap(Duration::from_millis(200)).await.unwrap();
        assert!(!status.success());
        assert!(!is_alive(pid));
    }
}
