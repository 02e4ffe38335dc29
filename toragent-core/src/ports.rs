//! Local port allocation

use crate::error::{AgentError, Result};
use std::net::{Ipv4Addr, TcpListener};

/// Picks unused loopback TCP ports by letting the OS assign them
pub struct PortAllocator;

impl PortAllocator {
    /// Reserve `count` distinct free ports
    ///
    /// All listeners stay bound until every port is known, so the OS cannot
    /// hand out the same port twice. They are released on return.
    pub fn allocate(count: usize) -> Result<Vec<u16>> {
        let mut listeners = Vec::with_capacity(count);
        for _ in 0..count {
            let listener =
                TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).map_err(|_| AgentError::NoFreePort)?;
            listeners.push(listener);
        }

        listeners
            .iter()
            .map(|l| l.local_addr().map(|addr| addr.port()).map_err(AgentError::from))
            .collect()
    }

    pub fn allocate_one() -> Result<u16> {
        Self::allocate(1)?.pop().ok_or(AgentError::NoFreePort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ports_are_distinct() {
        let ports = PortAllocator::allocate(8).unwrap();
        assert_eq!(ports.len(), 8);
        let unique: HashSet<_> = ports.iter().collect();
        assert_eq!(unique.len(), 8);
        assert!(ports.iter().all(|&p| p != 0));
    }

    #[test]
    fn test_ports_are_released() {
        let port = PortAllocator::allocate_one().unwrap();
        TcpListener::bind((Ipv4Addr::LOCALHOST, port)).unwrap();
    }

    #[test]
    fn test_zero_ports() {
        assert!(PortAllocator::allocate(0).unwrap().is_empty());
    }
}
