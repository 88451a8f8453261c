//! # Discovery & Handshake
//!
//! LAN discovery and pairing.
//!
//! ```text
//! joiner                          host
//!   |--- FINDING_HOST (bcast) ---->|   AwaitingDiscovery
//!   |<-- I_AM_HOSTING -------------|
//!   |--- HANDSHAKE_REQUEST ------->|   Handshaking
//!   |<-- HANDSHAKE_RESPONSE{seed} -|   Paired
//!   |    (or HANDSHAKE_REJECTED)   |   Rejected -> AwaitingDiscovery
//! ```
//!
//! Spectators discover the same way and then send `SPECTATOR_REQUEST`, which
//! the host accepts unconditionally at any time.
//!
//! Discovery probes every port in a small range so a host that had to move
//! off its preferred port is still found.

mod host;
mod joiner;
mod spectator;

pub use host::{AcceptAll, AdmissionPolicy, HostListener, HostState, Pairing, SEED_RANGE};
pub use joiner::{discover_host, discover_hosts, find_host, request_handshake, DiscoveredHost};
pub use spectator::{request_spectate, SPECTATE_REPEATS, SPECTATE_SPACING};

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::{DEFAULT_DISCOVERY_PORT, DISCOVERY_PORT_SPAN};

/// Where and how long to look for hosts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// First discovery port.
    pub port_base: u16,
    /// Extra ports probed after `port_base`.
    pub port_span: u16,
    /// How long to collect answers.
    pub listen_window: Duration,
    /// Addresses probed (broadcast or unicast).
    pub targets: Vec<IpAddr>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port_base: DEFAULT_DISCOVERY_PORT,
            port_span: DISCOVERY_PORT_SPAN,
            listen_window: Duration::from_secs(3),
            targets: vec![IpAddr::V4(Ipv4Addr::BROADCAST)],
        }
    }
}

impl DiscoveryConfig {
    /// Every port probed, in order.
    pub fn ports(&self) -> impl Iterator<Item = u16> {
        self.port_base..=self.port_base.saturating_add(self.port_span)
    }
}

/// Joiner retry policy for `HANDSHAKE_REQUEST`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// Wait per attempt.
    pub timeout: Duration,
    /// Requests sent before giving up.
    pub attempts: u32,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(1000),
            attempts: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_range() {
        let config = DiscoveryConfig::default();
        let ports: Vec<u16> = config.ports().collect();
        assert_eq!(ports.first(), Some(&50000));
        assert_eq!(ports.last(), Some(&50010));
        assert_eq!(ports.len(), 11);
    }
}
