//! # Inbox
//!
//! The single reader of a peer's socket. Decodes every datagram and pushes
//! it onto a crossbeam channel so the turn flow can block on it together
//! with local input in one `select!`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::UdpTransport;
use crate::protocol::Message;
use crate::MAX_DATAGRAM_SIZE;

/// One event from the reader thread.
#[derive(Clone, Debug)]
pub enum Inbound {
    /// A datagram that decoded into a catalog message.
    Message {
        /// The typed message.
        message: Message,
        /// The bytes as received, for verbatim relaying.
        raw: Vec<u8>,
        /// Sender address.
        from: SocketAddr,
    },
    /// The socket failed; the reader has stopped.
    Fault(String),
}

/// Socket reader thread plus the channel it feeds.
///
/// Dropping the inbox stops the thread.
pub struct Inbox {
    receiver: Receiver<Inbound>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Inbox {
    /// Starts reading from `transport`.
    #[must_use]
    pub fn spawn(transport: UdpTransport) -> Self {
        let (sender, receiver) = unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = Arc::clone(&shutdown);

        let handle = thread::spawn(move || Self::reader_loop(&transport, &sender, &thread_shutdown));

        Self {
            receiver,
            shutdown,
            handle: Some(handle),
        }
    }

    fn reader_loop(transport: &UdpTransport, sender: &Sender<Inbound>, shutdown: &AtomicBool) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        while !shutdown.load(Ordering::Relaxed) {
            let (len, from) = match transport.recv_from(&mut buf) {
                Ok(Some(received)) => received,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "socket read failed, reader stopping");
                    let _ = sender.send(Inbound::Fault(e.to_string()));
                    return;
                }
            };

            let raw = buf[..len].to_vec();
            match Message::decode(&raw) {
                Ok(message) => {
                    tracing::debug!(kind = %message.kind(), seq = ?message.sequence_number(), %from, "recv");
                    if sender.send(Inbound::Message { message, raw, from }).is_err() {
                        return;
                    }
                }
                Err(e) => tracing::debug!(%from, error = %e, "dropping undecodable datagram"),
            }
        }
    }

    /// The receiving end of the reader channel.
    #[must_use]
    pub const fn receiver(&self) -> &Receiver<Inbound> {
        &self.receiver
    }

    /// Stops the reader and waits for it.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Inbox {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    #[test]
    fn test_inbox_decodes_and_drops_garbage() {
        let loopback = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        let reader = UdpTransport::bind(loopback).unwrap();
        let writer = UdpTransport::bind(loopback).unwrap();
        let inbox = Inbox::spawn(reader.clone());

        writer.send_to(b"message_type: NONSENSE\n", reader.local_addr()).unwrap();
        writer
            .send_message(&Message::Ack { ack_number: 8 }, reader.local_addr())
            .unwrap();

        match inbox.receiver().recv_timeout(Duration::from_secs(2)).unwrap() {
            Inbound::Message { message, from, .. } => {
                assert_eq!(message, Message::Ack { ack_number: 8 });
                assert_eq!(from, writer.local_addr());
            }
            Inbound::Fault(e) => panic!("unexpected fault: {e}"),
        }
    }
}
