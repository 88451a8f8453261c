//! # Retransmission Sweeper
//!
//! Timer thread that drives [`ReliableChannel::check_retransmissions`] on a
//! fixed cadence, independent of turn progress, and publishes failed
//! sequence numbers on a channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{tick, unbounded, Receiver};

use super::ReliableChannel;
use crate::protocol::SequenceNumber;

/// Background retransmission driver.
///
/// Dropping the sweeper stops the thread.
pub struct RetransmitSweeper {
    failures: Receiver<SequenceNumber>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RetransmitSweeper {
    /// Starts sweeping `channel` every `interval`.
    #[must_use]
    pub fn spawn(channel: Arc<ReliableChannel>, interval: Duration) -> Self {
        let (failure_tx, failures) = unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = Arc::clone(&shutdown);

        let handle = thread::spawn(move || {
            let ticker = tick(interval);
            while !thread_shutdown.load(Ordering::Relaxed) {
                if ticker.recv().is_err() {
                    break;
                }
                for sequence in channel.check_retransmissions() {
                    if failure_tx.send(sequence).is_err() {
                        // Nobody is listening for failures anymore
                        return;
                    }
                }
            }
        });

        Self {
            failures,
            shutdown,
            handle: Some(handle),
        }
    }

    /// Sequence numbers whose retries were exhausted, each reported once.
    #[must_use]
    pub const fn failures(&self) -> &Receiver<SequenceNumber> {
        &self.failures
    }

    /// Stops the thread and waits for it.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Returns whether the sweeper thread is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RetransmitSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Message;
    use crate::transport::{ChannelConfig, UdpTransport};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    #[test]
    fn test_sweeper_reports_failure() {
        let loopback = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        let sender = UdpTransport::bind(loopback).unwrap();
        let sink = UdpTransport::bind(loopback).unwrap();
        let channel = Arc::new(ReliableChannel::new(
            sender,
            ChannelConfig {
                timeout: Duration::from_millis(20),
                max_retries: 1,
            },
        ));

        let seq = channel
            .send_reliable(Message::CalculationConfirm { sequence_number: 0 }, sink.local_addr())
            .unwrap();

        let mut sweeper = RetransmitSweeper::spawn(Arc::clone(&channel), Duration::from_millis(5));
        let failed = sweeper.failures().recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(failed, seq);
        assert_eq!(channel.pending_count(), 0);

        sweeper.stop();
        assert!(!sweeper.is_running());
    }
}
