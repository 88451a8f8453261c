//! # Peer Descriptors
//!
//! Who is on the other end of a datagram. A local descriptor owns the bound
//! socket; a remote one is just a name and an address.

use std::fmt;
use std::net::SocketAddr;

use crate::transport::UdpTransport;

/// Role a peer plays in a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PeerRole {
    /// Owns the spectator list and the relay authority.
    Host,
    /// Plays against the host.
    Joiner,
    /// Read-only observer.
    Spectator,
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Host => "host",
            Self::Joiner => "joiner",
            Self::Spectator => "spectator",
        })
    }
}

/// Display name, address, and (for the local peer) the socket.
#[derive(Clone, Debug)]
pub struct PeerDescriptor {
    name: String,
    addr: SocketAddr,
    transport: Option<UdpTransport>,
}

impl PeerDescriptor {
    /// Describes this process, which owns `transport`.
    #[must_use]
    pub fn local(name: impl Into<String>, transport: UdpTransport) -> Self {
        Self {
            name: name.into(),
            addr: transport.local_addr(),
            transport: Some(transport),
        }
    }

    /// Describes another peer by address.
    #[must_use]
    pub fn remote(name: impl Into<String>, addr: SocketAddr) -> Self {
        Self {
            name: name.into(),
            addr,
            transport: None,
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Network address.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The owned socket, for local descriptors.
    #[must_use]
    pub const fn transport(&self) -> Option<&UdpTransport> {
        self.transport.as_ref()
    }

    /// Returns true for the descriptor that owns a socket.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.transport.is_some()
    }

    /// Replaces the display name (names often arrive after the address).
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}

impl fmt::Display for PeerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.addr)
    }
}
