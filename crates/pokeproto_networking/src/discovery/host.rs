//! Host-side listener: answers discovery, admits spectators, and pairs with
//! exactly one joiner.

use std::net::SocketAddr;

use crossbeam_channel::Receiver;
use rand::Rng;

use crate::error::{NetError, NetResult};
use crate::peer::PeerDescriptor;
use crate::protocol::Message;
use crate::relay::SpectatorSet;
use crate::transport::{Inbound, UdpTransport};

/// Handshake seeds are drawn from `0..SEED_RANGE`.
pub const SEED_RANGE: u64 = 999;

/// Host pairing state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostState {
    /// Not listening yet.
    Idle,
    /// Answering discovery, waiting for a handshake request.
    AwaitingDiscovery,
    /// A request arrived and is being decided.
    Handshaking,
    /// A joiner was accepted.
    Paired,
    /// The last request was refused.
    Rejected,
}

/// Decides whether a joiner may pair.
pub trait AdmissionPolicy {
    /// Returns true to accept `name` at `from`.
    fn admit(&mut self, name: &str, from: SocketAddr) -> bool;
}

impl<F> AdmissionPolicy for F
where
    F: FnMut(&str, SocketAddr) -> bool,
{
    fn admit(&mut self, name: &str, from: SocketAddr) -> bool {
        self(name, from)
    }
}

/// Accepts every joiner.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl AdmissionPolicy for AcceptAll {
    fn admit(&mut self, _name: &str, _from: SocketAddr) -> bool {
        true
    }
}

/// A completed pairing.
#[derive(Clone, Debug)]
pub struct Pairing {
    /// The accepted joiner.
    pub joiner: PeerDescriptor,
    /// Shared random seed.
    pub seed: u64,
    /// Spectators admitted while waiting.
    pub spectators: SpectatorSet,
}

/// Host discovery and pairing state machine.
pub struct HostListener {
    name: String,
    transport: UdpTransport,
    state: HostState,
    fixed_seed: Option<u64>,
    spectators: SpectatorSet,
    paired: Option<(SocketAddr, u64)>,
}

impl HostListener {
    /// Creates a listener advertising `name` on `transport`.
    #[must_use]
    pub fn new(name: impl Into<String>, transport: UdpTransport) -> Self {
        Self {
            name: name.into(),
            transport,
            state: HostState::Idle,
            fixed_seed: None,
            spectators: SpectatorSet::new(),
            paired: None,
        }
    }

    /// Uses `seed` instead of a random one.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.fixed_seed = Some(seed);
        self
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> HostState {
        self.state
    }

    /// Spectators admitted so far.
    #[must_use]
    pub const fn spectators(&self) -> &SpectatorSet {
        &self.spectators
    }

    /// The discovery answer this host sends.
    #[must_use]
    pub fn hosting_reply(&self) -> Message {
        let local = self.transport.local_addr();
        Message::IAmHosting {
            name: self.name.clone(),
            ip: local.ip().to_string(),
            port: local.port(),
        }
    }

    fn next_seed(&self) -> u64 {
        self.fixed_seed
            .unwrap_or_else(|| rand::thread_rng().gen_range(0..SEED_RANGE))
    }

    /// Processes one inbound message. Returns the pairing once a joiner is
    /// accepted.
    ///
    /// # Errors
    ///
    /// Socket errors while answering.
    pub fn handle(
        &mut self,
        message: &Message,
        from: SocketAddr,
        policy: &mut dyn AdmissionPolicy,
    ) -> NetResult<Option<Pairing>> {
        if self.state == HostState::Idle {
            self.state = HostState::AwaitingDiscovery;
        }

        match message {
            Message::FindingHost => {
                tracing::debug!(%from, "discovery probe");
                self.transport.send_message(&self.hosting_reply(), from)?;
            }
            Message::SpectatorRequest { name } => {
                let name = name.clone().unwrap_or_else(|| "spectator".to_string());
                if self.spectators.add(PeerDescriptor::remote(name, from)) {
                    tracing::info!(%from, "spectator admitted");
                }
            }
            Message::HandshakeRequest { name } => {
                // A retransmitted request from the joiner we already accepted
                if let Some((addr, seed)) = self.paired {
                    if addr == from {
                        self.transport.send_message(&Message::HandshakeResponse { seed }, from)?;
                    }
                    return Ok(None);
                }

                self.state = HostState::Handshaking;
                tracing::info!(joiner = %name, %from, "handshake request");

                if policy.admit(name, from) {
                    let seed = self.next_seed();
                    self.transport.send_message(&Message::HandshakeResponse { seed }, from)?;
                    self.state = HostState::Paired;
                    self.paired = Some((from, seed));
                    tracing::info!(joiner = %name, seed, "paired");
                    return Ok(Some(Pairing {
                        joiner: PeerDescriptor::remote(name.clone(), from),
                        seed,
                        spectators: self.spectators.clone(),
                    }));
                }

                self.transport.send_message(&Message::HandshakeRejected, from)?;
                self.state = HostState::Rejected;
                tracing::info!(joiner = %name, "handshake rejected");
            }
            other => tracing::trace!(kind = %other.kind(), %from, "ignored while pairing"),
        }

        if self.state == HostState::Rejected {
            self.state = HostState::AwaitingDiscovery;
        }
        Ok(None)
    }

    /// Blocks until a joiner is accepted.
    ///
    /// # Errors
    ///
    /// Socket errors, or [`NetError::InboxClosed`] when the reader stops.
    pub fn wait_for_joiner(
        &mut self,
        inbox: &Receiver<Inbound>,
        policy: &mut dyn AdmissionPolicy,
    ) -> NetResult<Pairing> {
        self.state = HostState::AwaitingDiscovery;
        tracing::info!(name = %self.name, addr = %self.transport.local_addr(), "hosting, waiting for a joiner");

        loop {
            match inbox.recv().map_err(|_| NetError::InboxClosed)? {
                Inbound::Message { message, from, .. } => {
                    if let Some(pairing) = self.handle(&message, from, policy)? {
                        return Ok(pairing);
                    }
                }
                Inbound::Fault(reason) => {
                    return Err(NetError::Io(std::io::Error::new(std::io::ErrorKind::Other, reason)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn loopback() -> UdpTransport {
        UdpTransport::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)).unwrap()
    }

    fn recv(transport: &UdpTransport) -> Message {
        transport.set_read_timeout(Duration::from_secs(2)).unwrap();
        let mut buf = [0u8; 1024];
        let (len, _) = transport.recv_from(&mut buf).unwrap().unwrap();
        Message::decode(&buf[..len]).unwrap()
    }

    #[test]
    fn test_accept_then_repeat_request_gets_same_seed() {
        let host = loopback();
        let joiner = loopback();
        let mut listener = HostListener::new("Red", host).with_seed(42);

        let request = Message::HandshakeRequest { name: "Blue".into() };
        let pairing = listener
            .handle(&request, joiner.local_addr(), &mut AcceptAll)
            .unwrap()
            .unwrap();
        assert_eq!(pairing.seed, 42);
        assert_eq!(pairing.joiner.name(), "Blue");
        assert_eq!(listener.state(), HostState::Paired);
        assert_eq!(recv(&joiner), Message::HandshakeResponse { seed: 42 });

        assert!(listener.handle(&request, joiner.local_addr(), &mut AcceptAll).unwrap().is_none());
        assert_eq!(recv(&joiner), Message::HandshakeResponse { seed: 42 });
    }

    #[test]
    fn test_reject_is_explicit() {
        let host = loopback();
        let joiner = loopback();
        let mut listener = HostListener::new("Red", host);
        let mut refuse = |_: &str, _: SocketAddr| false;

        let outcome = listener
            .handle(&Message::HandshakeRequest { name: "Blue".into() }, joiner.local_addr(), &mut refuse)
            .unwrap();
        assert!(outcome.is_none());
        assert_eq!(recv(&joiner), Message::HandshakeRejected);
        assert_eq!(listener.state(), HostState::AwaitingDiscovery);
    }

    #[test]
    fn test_discovery_and_spectators() {
        let host = loopback();
        let host_addr = host.local_addr();
        let probe = loopback();
        let mut listener = HostListener::new("Red", host);

        listener.handle(&Message::FindingHost, probe.local_addr(), &mut AcceptAll).unwrap();
        assert_eq!(
            recv(&probe),
            Message::IAmHosting {
                name: "Red".into(),
                ip: host_addr.ip().to_string(),
                port: host_addr.port()
            }
        );

        let request = Message::SpectatorRequest { name: None };
        listener.handle(&request, probe.local_addr(), &mut AcceptAll).unwrap();
        listener.handle(&request, probe.local_addr(), &mut AcceptAll).unwrap();
        assert_eq!(listener.spectators().len(), 1);
    }

    #[test]
    fn test_random_seed_in_range() {
        let listener = HostListener::new("Red", loopback());
        for _ in 0..100 {
            assert!(listener.next_seed() < SEED_RANGE);
        }
    }
}
