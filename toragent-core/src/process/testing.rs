//! Scripted stand-ins for the Tor binary

use crate::config::TorConfig;
use std::path::{Path, PathBuf};

/// Behaviour of a fake Tor script
///
/// Every variant records its SOCKS port in `<data dir>/launches`. Apart
/// from `Unresponsive`, each answers SIGHUP with the reload line and
/// SIGINT with the clean exit line.
#[derive(Debug, Clone, Copy)]
pub(crate) enum FakeTor {
    Ready,
    NeverReady,
    /// Bootstraps only once the launch count reaches the given number
    ReadyOnLaunch(u32),
    ExitsWith(i32),
    /// Bootstraps, then swallows SIGHUP and SIGINT without a word
    Unresponsive,
}

impl FakeTor {
    fn body(self) -> String {
        match self {
            FakeTor::Ready => "echo 'Bootstrapped 100% (done): Done'\n".to_string(),
            FakeTor::NeverReady => String::new(),
            FakeTor::ReadyOnLaunch(launch) => format!(
                concat!(
                    "n=$(wc -l < \"$4/launches\")\n",
                    "if [ $n -ge {} ]; then\n",
                    "  echo 'Bootstrapped 100% (done): Done'\n",
                    "fi\n",
                ),
                launch
            ),
            FakeTor::ExitsWith(code) => format!("echo 'Opening Socks listener failed'\nexit {code}\n"),
            FakeTor::Unresponsive => concat!(
                "trap ':' HUP\n",
                "trap ':' INT\n",
                "echo 'Bootstrapped 100% (done): Done'\n",
            )
            .to_string(),
        }
    }

    /// Write the script into `dir` and return its path
    ///
    /// Scripts are run through `sh` rather than executed directly, which
    /// sidesteps ETXTBSY on freshly written files.
    pub(crate) fn write(self, dir: &Path) -> PathBuf {
        let script = format!(
            concat!(
                "echo \"$2\" >> \"$4/launches\"\n",
                "trap 'echo \"Received reload signal (hup). Reloading config and resetting internal state.\"' HUP\n",
                "trap 'echo \"Interrupt: exiting cleanly.\"; exit 0' INT\n",
                "echo 'Bootstrapped 0% (starting): Starting'\n",
                "{}",
                "while :; do sleep 0.05; done\n",
            ),
            self.body()
        );

        let path = dir.join(format!("fake-tor-{}.sh", std::process::id()));
        std::fs::write(&path, script).unwrap();
        path
    }
}

/// A `TorConfig` that runs `script` under `sh` with short delays
pub(crate) fn fake_tor_config(script: &Path) -> TorConfig {
    TorConfig {
        binary: PathBuf::from("sh"),
        args: vec![script.display().to_string()],
        settle_delay_ms: 50,
        control_timeout_ms: 5_000,
        ..TorConfig::default()
    }
}
