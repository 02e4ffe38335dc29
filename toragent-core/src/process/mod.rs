//! Supervision of the Tor process
//!
//! [`ProcessSupervisor`] launches Tor and waits for it to bootstrap,
//! retrying on timeout. The resulting [`ManagedProcess`] controls it
//! through signals and the acknowledgements Tor prints on stdout.

mod control;
mod scanner;
mod signal;
mod state;
mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use control::ManagedProcess;
pub use scanner::{LineScanner, ScanOutcome};
pub use signal::{is_alive, send_signal};
pub use state::ProcessState;
pub use supervisor::ProcessSupervisor;
