//! # Reliable Channel
//!
//! Stop-and-wait style ARQ over the shared UDP socket.
//!
//! ## Design
//!
//! - Sequence numbers come from an atomic counter starting at 1
//! - Every reliable send records a [`PendingSend`] keyed by sequence number
//! - The pending table is the only state shared between the sending path and
//!   the ACK path, and every access goes through one `parking_lot::Mutex`
//! - [`ReliableChannel::check_retransmissions`] is driven on a fixed cadence by
//!   a [`super::RetransmitSweeper`]; it never transmits while holding the lock

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::UdpTransport;
use crate::error::{NetError, NetResult};
use crate::protocol::{Message, SequenceNumber};

/// Retransmission parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Age after which an unacknowledged send is retransmitted.
    pub timeout: Duration,
    /// Retransmissions allowed before a send is reported as failed.
    pub max_retries: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            max_retries: 3,
        }
    }
}

/// A reliable send awaiting acknowledgement.
#[derive(Clone, Debug)]
struct PendingSend {
    message: Message,
    destination: SocketAddr,
    retries_remaining: u32,
    last_sent: Instant,
}

/// Reliable delivery over a [`UdpTransport`].
pub struct ReliableChannel {
    transport: UdpTransport,
    config: ChannelConfig,
    next_sequence: AtomicU32,
    pending: Mutex<HashMap<SequenceNumber, PendingSend>>,
}

impl ReliableChannel {
    /// Creates a channel over the given transport.
    #[must_use]
    pub fn new(transport: UdpTransport, config: ChannelConfig) -> Self {
        Self {
            transport,
            config,
            next_sequence: AtomicU32::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &UdpTransport {
        &self.transport
    }

    /// Retransmission parameters.
    #[must_use]
    pub const fn config(&self) -> ChannelConfig {
        self.config
    }

    /// Allocates the next sequence number. Strictly increasing, thread-safe.
    pub fn next_sequence_number(&self) -> SequenceNumber {
        self.next_sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Stamps a fresh sequence number, records the send, and transmits.
    ///
    /// # Errors
    ///
    /// [`NetError::Unsequenced`] for kinds without a sequence number; socket
    /// errors from the first transmission (the record is dropped in that case).
    pub fn send_reliable(&self, message: Message, destination: SocketAddr) -> NetResult<SequenceNumber> {
        self.send_reliable_with_copies(message, destination, &[])
    }

    /// Like [`ReliableChannel::send_reliable`], but the first transmission
    /// also goes to `copies` in the same send loop. Only `destination` is
    /// tracked for acknowledgement and retransmission.
    ///
    /// # Errors
    ///
    /// See [`ReliableChannel::send_reliable`]. Failures towards `copies` are
    /// logged and ignored.
    pub fn send_reliable_with_copies(
        &self,
        mut message: Message,
        destination: SocketAddr,
        copies: &[SocketAddr],
    ) -> NetResult<SequenceNumber> {
        let kind = message.kind();
        let sequence = self.next_sequence_number();
        if !message.set_sequence_number(sequence) {
            return Err(NetError::Unsequenced(kind.as_str()));
        }

        let bytes = message.encode();
        self.pending.lock().insert(
            sequence,
            PendingSend {
                message,
                destination,
                retries_remaining: self.config.max_retries,
                last_sent: Instant::now(),
            },
        );

        tracing::debug!(%kind, seq = sequence, to = %destination, "send reliable");
        if let Err(e) = self.transport.send_to(&bytes, destination) {
            self.pending.lock().remove(&sequence);
            return Err(e);
        }

        for copy in copies.iter().filter(|addr| **addr != destination) {
            if let Err(e) = self.transport.send_to(&bytes, *copy) {
                tracing::warn!(%kind, seq = sequence, to = %copy, error = %e, "copy send failed");
            }
        }

        Ok(sequence)
    }

    /// Marks a send as acknowledged. Returns false when nothing was pending
    /// under that number (already acknowledged, failed, or never sent).
    pub fn receive_ack(&self, sequence: SequenceNumber) -> bool {
        let removed = self.pending.lock().remove(&sequence).is_some();
        if removed {
            tracing::debug!(seq = sequence, "ack received");
        } else {
            tracing::trace!(seq = sequence, "ack for nothing pending");
        }
        removed
    }

    /// Sends an ACK. Untracked.
    ///
    /// # Errors
    ///
    /// Returns the socket error.
    pub fn send_ack(&self, sequence: SequenceNumber, destination: SocketAddr) -> NetResult<()> {
        self.transport
            .send_message(&Message::Ack { ack_number: sequence }, destination)?;
        Ok(())
    }

    /// Retransmits stale sends and reports the ones that ran out of retries.
    ///
    /// Each failed sequence number is reported exactly once, then forgotten.
    pub fn check_retransmissions(&self) -> Vec<SequenceNumber> {
        self.check_retransmissions_at(Instant::now())
    }

    /// [`ReliableChannel::check_retransmissions`] against an explicit clock.
    pub fn check_retransmissions_at(&self, now: Instant) -> Vec<SequenceNumber> {
        let mut resends = Vec::new();
        let mut failed = Vec::new();

        {
            let mut pending = self.pending.lock();
            pending.retain(|sequence, entry| {
                if now.saturating_duration_since(entry.last_sent) <= self.config.timeout {
                    return true;
                }
                if entry.retries_remaining == 0 {
                    failed.push(*sequence);
                    return false;
                }
                entry.retries_remaining -= 1;
                entry.last_sent = now;
                resends.push((*sequence, entry.message.encode(), entry.destination));
                true
            });
        }

        for (sequence, bytes, destination) in resends {
            tracing::warn!(seq = sequence, to = %destination, "retransmitting");
            if let Err(e) = self.transport.send_to(&bytes, destination) {
                tracing::warn!(seq = sequence, error = %e, "retransmission failed");
            }
        }

        failed.sort_unstable();
        for sequence in &failed {
            tracing::warn!(seq = sequence, "retries exhausted, dropping");
        }
        failed
    }

    /// Number of sends awaiting acknowledgement.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether `sequence` is still awaiting acknowledgement.
    #[must_use]
    pub fn is_pending(&self, sequence: SequenceNumber) -> bool {
        self.pending.lock().contains_key(&sequence)
    }

    /// Retries left for a pending send.
    #[must_use]
    pub fn retries_remaining(&self, sequence: SequenceNumber) -> Option<u32> {
        self.pending.lock().get(&sequence).map(|p| p.retries_remaining)
    }

    /// Drops every pending send.
    pub fn clear(&self) {
        self.pending.lock().clear();
    }
}

impl std::fmt::Debug for ReliableChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReliableChannel")
            .field("transport", &self.transport)
            .field("config", &self.config)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}
