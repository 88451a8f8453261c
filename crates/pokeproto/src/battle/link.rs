//! Socket, reader, reliable channel and sweeper for one match.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use pokeproto_networking::{
    ChannelConfig, Inbound, Inbox, ReliableChannel, RetransmitSweeper, SequenceNumber, UdpTransport,
};

/// Everything a coordinator needs to talk to its peer.
///
/// The inbox is created before discovery so the same reader serves the
/// handshake and the battle. Dropping the link stops both threads.
pub struct BattleLink {
    transport: UdpTransport,
    inbox: Inbox,
    channel: Arc<ReliableChannel>,
    sweeper: RetransmitSweeper,
}

impl BattleLink {
    /// Wraps a paired socket and starts the retransmission sweeper.
    #[must_use]
    pub fn open(transport: UdpTransport, inbox: Inbox, config: ChannelConfig, sweep_interval: Duration) -> Self {
        let channel = Arc::new(ReliableChannel::new(transport.clone(), config));
        let sweeper = RetransmitSweeper::spawn(Arc::clone(&channel), sweep_interval);
        tracing::debug!(
            local = %transport.local_addr(),
            timeout_ms = config.timeout.as_millis() as u64,
            retries = config.max_retries,
            "battle link open"
        );
        Self {
            transport,
            inbox,
            channel,
            sweeper,
        }
    }

    /// The socket.
    #[must_use]
    pub const fn transport(&self) -> &UdpTransport {
        &self.transport
    }

    /// The reliable channel.
    #[must_use]
    pub fn channel(&self) -> &ReliableChannel {
        &self.channel
    }

    /// Decoded datagrams.
    #[must_use]
    pub const fn inbound(&self) -> &Receiver<Inbound> {
        self.inbox.receiver()
    }

    /// Sequence numbers that ran out of retries.
    #[must_use]
    pub const fn failures(&self) -> &Receiver<SequenceNumber> {
        self.sweeper.failures()
    }

    /// Stops retransmitting and reading.
    pub fn close(&mut self) {
        self.sweeper.stop();
        self.channel.clear();
        self.inbox.stop();
        tracing::debug!(local = %self.transport.local_addr(), "battle link closed");
    }
}
