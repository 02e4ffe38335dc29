//! Lifecycle states of a supervised proxy process

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Launched, waiting for the bootstrap marker
    Spawning { generation: u32 },
    /// Bootstrapped and accepting SOCKS connections
    Ready,
    /// Shut down, or exited after becoming ready
    Terminated,
    /// Never became ready
    Failed { exit_code: Option<i32> },
}

impl ProcessState {
    /// Whether moving from `self` to `next` is a legal transition
    ///
    /// `Spawning` may only loop to the next generation, and `Ready` may only
    /// move to `Terminated`.
    pub fn can_transition_to(&self, next: &ProcessState) -> bool {
        use ProcessState::*;

        match (self, next) {
            (Spawning { generation }, Spawning { generation: next_gen }) => {
                *next_gen == generation + 1
            }
            (Spawning { .. }, Ready) => true,
            (Spawning { .. }, Failed { .. }) => true,
            (Ready, Terminated) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Terminated | ProcessState::Failed { .. })
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Spawning { generation } => write!(f, "spawning (generation {generation})"),
            ProcessState::Ready => write!(f, "ready"),
            ProcessState::Terminated => write!(f, "terminated"),
            ProcessState::Failed { exit_code: Some(code) } => write!(f, "failed (exit code {code})"),
            ProcessState::Failed { exit_code: None } => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProcessState::*;

    #[test]
    fn test_linear_transitions() {
        assert!(Spawning { generation: 0 }.can_transition_to(&Ready));
        assert!(Ready.can_transition_to(&Terminated));
        assert!(Spawning { generation: 0 }.can_transition_to(&Failed { exit_code: Some(1) }));
    }

    #[test]
    fn test_retry_advances_generation() {
        assert!(Spawning { generation: 0 }.can_transition_to(&Spawning { generation: 1 }));
        assert!(!Spawning { generation: 1 }.can_transition_to(&Spawning { generation: 1 }));
        assert!(!Spawning { generation: 2 }.can_transition_to(&Spawning { generation: 1 }));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!Ready.can_transition_to(&Spawning { generation: 1 }));
        assert!(!Ready.can_transition_to(&Failed { exit_code: None }));
        assert!(!Terminated.can_transition_to(&Ready));
        assert!(!Spawning { generation: 0 }.can_transition_to(&Terminated));
        assert!(!Failed { exit_code: None }.can_transition_to(&Spawning { generation: 0 }));
    }

    #[test]
    fn test_terminal_states() {
        assert!(Terminated.is_terminal());
        assert!(Failed { exit_code: Some(2) }.is_terminal());
        assert!(!Ready.is_terminal());
        assert!(!Spawning { generation: 3 }.is_terminal());
    }
}
