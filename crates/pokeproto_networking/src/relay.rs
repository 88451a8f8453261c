//! # Relay
//!
//! Spectator fan-out. Only the host holds the spectator list and relays.
//!
//! ## Modes
//!
//! - **Peer-to-peer**: the primary send goes to the opponent, then a separate
//!   mirror step copies spectator-visible messages to every spectator
//! - **Broadcast**: spectators are folded into the primary send as extra
//!   destinations of the same transmission
//!
//! Spectators end up with the same copies either way.
//!
//! ## Chat routing (host side)
//!
//! | Origin    | Opponent          | Spectators          |
//! |-----------|-------------------|---------------------|
//! | local     | yes               | all                 |
//! | opponent  | -                 | all                 |
//! | spectator | broadcast only    | all but the sender  |

use std::fmt;
use std::net::SocketAddr;

use crate::error::NetResult;
use crate::peer::PeerDescriptor;
use crate::protocol::{Message, SequenceNumber};
use crate::transport::{ReliableChannel, UdpTransport};

/// Spectator fan-out policy, fixed by the host for the whole session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CommunicationMode {
    /// Direct sends plus an explicit mirror step.
    #[default]
    PeerToPeer,
    /// Spectators folded into every send.
    Broadcast,
}

impl CommunicationMode {
    /// Wire token (`P` or `B`).
    #[must_use]
    pub const fn as_token(self) -> &'static str {
        match self {
            Self::PeerToPeer => "P",
            Self::Broadcast => "B",
        }
    }

    /// Parses `P`/`B` (any case) or the long names.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "P" | "P2P" | "PEER" | "PEER_TO_PEER" => Some(Self::PeerToPeer),
            "B" | "BROADCAST" => Some(Self::Broadcast),
            _ => None,
        }
    }
}

impl fmt::Display for CommunicationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PeerToPeer => "peer-to-peer",
            Self::Broadcast => "broadcast",
        })
    }
}

/// Where a chat line came from, relative to the relaying peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatOrigin {
    /// Typed by the local player.
    Local,
    /// Received from the opponent.
    Opponent,
    /// Received from the spectator at this address.
    Spectator(SocketAddr),
}

/// Destinations for one chat line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatRoute {
    /// Deliver to the opponent.
    pub to_opponent: bool,
    /// Deliver to these spectators.
    pub spectators: Vec<SocketAddr>,
}

/// Known spectators, keyed by address. Insertion order is kept.
#[derive(Clone, Debug, Default)]
pub struct SpectatorSet {
    peers: Vec<PeerDescriptor>,
}

impl SpectatorSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { peers: Vec::new() }
    }

    /// Adds a spectator. Returns false when the address is already known.
    pub fn add(&mut self, peer: PeerDescriptor) -> bool {
        if self.contains(peer.addr()) {
            return false;
        }
        self.peers.push(peer);
        true
    }

    /// Whether `addr` belongs to a spectator.
    #[must_use]
    pub fn contains(&self, addr: SocketAddr) -> bool {
        self.peers.iter().any(|p| p.addr() == addr)
    }

    /// Spectator addresses.
    #[must_use]
    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.peers.iter().map(PeerDescriptor::addr).collect()
    }

    /// Spectator descriptors.
    #[must_use]
    pub fn peers(&self) -> &[PeerDescriptor] {
        &self.peers
    }

    /// Number of spectators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Returns true when nobody is watching.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Forgets every spectator.
    pub fn clear(&mut self) {
        self.peers.clear();
    }
}

/// Fan-out policy bound to one peer's role and spectator list.
#[derive(Clone, Debug)]
pub struct Relay {
    mode: CommunicationMode,
    is_host: bool,
    spectators: SpectatorSet,
}

impl Relay {
    /// Creates the relay for the host, which owns the spectator list.
    #[must_use]
    pub const fn host(mode: CommunicationMode, spectators: SpectatorSet) -> Self {
        Self {
            mode,
            is_host: true,
            spectators,
        }
    }

    /// Creates the relay for a joiner, which never mirrors.
    #[must_use]
    pub const fn joiner(mode: CommunicationMode) -> Self {
        Self {
            mode,
            is_host: false,
            spectators: SpectatorSet::new(),
        }
    }

    /// Fan-out policy.
    #[must_use]
    pub const fn mode(&self) -> CommunicationMode {
        self.mode
    }

    /// Sets the policy. The joiner learns it during setup.
    pub fn set_mode(&mut self, mode: CommunicationMode) {
        self.mode = mode;
    }

    /// Whether this relay may mirror to spectators.
    #[must_use]
    pub const fn is_host(&self) -> bool {
        self.is_host
    }

    /// Known spectators.
    #[must_use]
    pub const fn spectators(&self) -> &SpectatorSet {
        &self.spectators
    }

    /// Adds a spectator (host only). Returns true when it was new.
    pub fn add_spectator(&mut self, peer: PeerDescriptor) -> bool {
        if !self.is_host {
            return false;
        }
        let added = self.spectators.add(peer);
        if added {
            tracing::info!(spectators = self.spectators.len(), "spectator joined");
        }
        added
    }

    /// Releases the spectator list.
    pub fn clear_spectators(&mut self) {
        self.spectators.clear();
    }

    fn mirror_targets(&self, message: &Message) -> Vec<SocketAddr> {
        if self.is_host && message.kind().is_spectator_visible() {
            self.spectators.addrs()
        } else {
            Vec::new()
        }
    }

    /// Sends a turn message reliably to the opponent and fans it out.
    ///
    /// # Errors
    ///
    /// Errors from the reliable send. Mirror failures are only logged.
    pub fn send_reliable(
        &self,
        channel: &ReliableChannel,
        message: Message,
        opponent: SocketAddr,
    ) -> NetResult<SequenceNumber> {
        let targets = self.mirror_targets(&message);
        match self.mode {
            CommunicationMode::Broadcast => channel.send_reliable_with_copies(message, opponent, &targets),
            CommunicationMode::PeerToPeer => {
                let mut mirror = message.clone();
                let sequence = channel.send_reliable(message, opponent)?;
                if !targets.is_empty() {
                    mirror.set_sequence_number(sequence);
                    self.mirror(channel.transport(), &mirror.encode(), None);
                }
                Ok(sequence)
            }
        }
    }

    /// Sends an untracked message to the opponent and fans it out.
    ///
    /// # Errors
    ///
    /// Socket errors towards the opponent.
    pub fn send_unreliable(&self, transport: &UdpTransport, message: &Message, opponent: SocketAddr) -> NetResult<()> {
        let targets = self.mirror_targets(message);
        match self.mode {
            CommunicationMode::Broadcast => {
                let bytes = message.encode();
                transport.send_to(&bytes, opponent)?;
                for addr in targets {
                    if let Err(e) = transport.send_to(&bytes, addr) {
                        tracing::warn!(to = %addr, error = %e, "spectator copy failed");
                    }
                }
            }
            CommunicationMode::PeerToPeer => {
                transport.send_message(message, opponent)?;
                if !targets.is_empty() {
                    self.mirror(transport, &message.encode(), None);
                }
            }
        }
        Ok(())
    }

    /// Copies raw bytes to every spectator except `except`. Host only.
    ///
    /// Returns the number of spectators reached.
    pub fn mirror(&self, transport: &UdpTransport, raw: &[u8], except: Option<SocketAddr>) -> usize {
        if !self.is_host {
            return 0;
        }
        let mut delivered = 0;
        for addr in self.spectators.addrs() {
            if Some(addr) == except {
                continue;
            }
            match transport.send_to(raw, addr) {
                Ok(_) => delivered += 1,
                Err(e) => tracing::warn!(to = %addr, error = %e, "mirror failed"),
            }
        }
        delivered
    }

    /// Relays a message received from the opponent to spectators when it is
    /// spectator-visible. Returns the number of spectators reached.
    pub fn relay_from_opponent(&self, transport: &UdpTransport, message: &Message, raw: &[u8]) -> usize {
        if message.kind().is_spectator_visible() {
            self.mirror(transport, raw, None)
        } else {
            0
        }
    }

    /// Destinations for a chat line from `origin`.
    #[must_use]
    pub fn route_chat(&self, origin: ChatOrigin) -> ChatRoute {
        match origin {
            ChatOrigin::Local => ChatRoute {
                to_opponent: true,
                spectators: if self.is_host { self.spectators.addrs() } else { Vec::new() },
            },
            _ if !self.is_host => ChatRoute::default(),
            ChatOrigin::Opponent => ChatRoute {
                to_opponent: false,
                spectators: self.spectators.addrs(),
            },
            ChatOrigin::Spectator(sender) => ChatRoute {
                to_opponent: self.mode == CommunicationMode::Broadcast,
                spectators: self
                    .spectators
                    .addrs()
                    .into_iter()
                    .filter(|addr| *addr != sender)
                    .collect(),
            },
        }
    }

    /// Delivers raw chat bytes along `route`.
    ///
    /// # Errors
    ///
    /// Socket errors towards the opponent; spectator failures are logged.
    pub fn deliver_chat(
        &self,
        transport: &UdpTransport,
        raw: &[u8],
        route: &ChatRoute,
        opponent: SocketAddr,
    ) -> NetResult<()> {
        if route.to_opponent {
            transport.send_to(raw, opponent)?;
        }
        for addr in &route.spectators {
            if let Err(e) = transport.send_to(raw, *addr) {
                tracing::warn!(to = %addr, error = %e, "chat relay failed");
            }
        }
        Ok(())
    }
}
