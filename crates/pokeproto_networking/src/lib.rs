//! # PokeProto Networking
//!
//! The wire layer for PokeProto matches: two peers and any number of
//! spectators talking over plain UDP with no central server.
//!
//! ## Architecture
//!
//! - **Protocol**: newline-delimited `key: value` text records and a typed
//!   message catalog on top of them
//! - **Transport**: one UDP socket per peer, a reader thread feeding a
//!   crossbeam channel, and an ARQ layer with a timer-driven sweeper
//! - **Discovery**: broadcast probes over a small port range, then a
//!   request/response/reject handshake that hands out the shared seed
//! - **Relay**: host-owned spectator list with peer-to-peer or broadcast fan-out
//!
//! ```text
//! JOINER                        HOST                     SPECTATOR
//!   |-- ATTACK_ANNOUNCE -------->|-- mirror ------------------>|
//!   |<------------------- ACK ---|                             |
//!   |<-- DEFENSE_ANNOUNCE -------|-- mirror ------------------>|
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use pokeproto_networking::{discover_host, request_handshake, Inbox, UdpTransport};
//!
//! let transport = UdpTransport::bind("0.0.0.0:0".parse()?)?;
//! let inbox = Inbox::spawn(transport.clone());
//! let host = discover_host(&transport, inbox.receiver(), &Default::default(), None)?;
//! let seed = request_handshake(&transport, inbox.receiver(), host.addr, "Blue", Default::default())?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod discovery;
pub mod error;
pub mod peer;
pub mod protocol;
pub mod relay;
pub mod transport;

pub use discovery::{
    discover_host, discover_hosts, find_host, request_handshake, request_spectate, AcceptAll,
    AdmissionPolicy, DiscoveredHost, DiscoveryConfig, HandshakeConfig, HostListener, HostState,
    Pairing,
};
pub use error::{NetError, NetResult};
pub use peer::{PeerDescriptor, PeerRole};
pub use protocol::{
    BattleSetup, CalculationReport, ChatContent, ChatMessage, Message, MessageKind,
    ResolutionRequest, SequenceNumber,
};
pub use relay::{ChatOrigin, ChatRoute, CommunicationMode, Relay, SpectatorSet};
pub use transport::{
    ChannelConfig, Inbound, Inbox, ReliableChannel, RetransmitSweeper, TransportStats, UdpTransport,
};

/// Well-known discovery port. Hosts that cannot bind it move up one port at a time.
pub const DEFAULT_DISCOVERY_PORT: u16 = 50000;

/// Ports probed after [`DEFAULT_DISCOVERY_PORT`].
pub const DISCOVERY_PORT_SPAN: u16 = 10;

/// Largest datagram the reader accepts.
pub const MAX_DATAGRAM_SIZE: usize = 65_535;
