//! # Transport Layer
//!
//! UDP socket wrapper shared by the reader thread, the retransmission
//! sweeper, and the turn flow.
//!
//! ## Design
//!
//! - One socket per peer; [`UdpTransport`] is a cheap clonable handle
//! - Blocking receive with a short read timeout so readers can observe shutdown
//! - Atomic counters for packet statistics
//! - Port fallback so a host can still come up when its port is taken

mod inbox;
mod reliability;
mod sweeper;

pub use inbox::{Inbound, Inbox};
pub use reliability::{ChannelConfig, ReliableChannel};
pub use sweeper::RetransmitSweeper;

use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{NetError, NetResult};
use crate::protocol::Message;

/// Default read timeout for blocking receives.
pub const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Transport statistics snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Datagrams sent.
    pub packets_sent: u64,
    /// Datagrams received.
    pub packets_received: u64,
    /// Bytes sent.
    pub bytes_sent: u64,
    /// Bytes received.
    pub bytes_received: u64,
    /// Send errors.
    pub send_errors: u64,
    /// Receive errors.
    pub recv_errors: u64,
}

#[derive(Default)]
struct StatCounters {
    packets_sent: AtomicU64,
    packets_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    send_errors: AtomicU64,
    recv_errors: AtomicU64,
}

/// UDP socket handle.
///
/// Clones share the same socket and counters.
#[derive(Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    stats: Arc<StatCounters>,
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl UdpTransport {
    /// Creates a transport bound to the specified address.
    ///
    /// # Errors
    ///
    /// Returns the socket error when the bind fails.
    pub fn bind(addr: SocketAddr) -> NetResult<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(READ_TIMEOUT))?;
        let local_addr = socket.local_addr()?;

        tracing::debug!(%local_addr, "udp socket bound");

        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
            stats: Arc::new(StatCounters::default()),
        })
    }

    /// Binds `ip:port`, moving up one port at a time on conflicts.
    ///
    /// Port 0 lets the OS choose and never falls back.
    ///
    /// # Errors
    ///
    /// [`NetError::BindExhausted`] when every port in the range is taken;
    /// other socket errors are returned as-is.
    pub fn bind_with_fallback(ip: IpAddr, port: u16, attempts: u16) -> NetResult<Self> {
        if port == 0 {
            return Self::bind(SocketAddr::new(ip, 0));
        }

        for offset in 0..attempts.max(1) {
            let Some(candidate) = port.checked_add(offset) else {
                break;
            };
            match Self::bind(SocketAddr::new(ip, candidate)) {
                Ok(transport) => {
                    if offset > 0 {
                        tracing::info!(requested = port, bound = candidate, "port in use, moved to next free port");
                    }
                    return Ok(transport);
                }
                Err(NetError::Io(e)) if e.kind() == io::ErrorKind::AddrInUse => {
                    tracing::debug!(port = candidate, "port in use");
                }
                Err(other) => return Err(other),
            }
        }

        Err(NetError::BindExhausted {
            ip,
            first_port: port,
            attempts,
        })
    }

    /// Returns the local address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Allows sending to broadcast addresses.
    ///
    /// # Errors
    ///
    /// Returns the socket error.
    pub fn set_broadcast(&self, enabled: bool) -> NetResult<()> {
        self.socket.set_broadcast(enabled)?;
        Ok(())
    }

    /// Changes the blocking receive timeout.
    ///
    /// # Errors
    ///
    /// Returns the socket error.
    pub fn set_read_timeout(&self, timeout: Duration) -> NetResult<()> {
        self.socket.set_read_timeout(Some(timeout))?;
        Ok(())
    }

    /// Sends raw bytes.
    ///
    /// # Errors
    ///
    /// Returns the socket error.
    pub fn send_to(&self, data: &[u8], addr: SocketAddr) -> NetResult<usize> {
        match self.socket.send_to(data, addr) {
            Ok(n) => {
                self.stats.packets_sent.fetch_add(1, Ordering::Relaxed);
                self.stats.bytes_sent.fetch_add(n as u64, Ordering::Relaxed);
                Ok(n)
            }
            Err(e) => {
                self.stats.send_errors.fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }

    /// Encodes and sends a message.
    ///
    /// # Errors
    ///
    /// Returns the socket error.
    pub fn send_message(&self, message: &Message, addr: SocketAddr) -> NetResult<usize> {
        tracing::debug!(kind = %message.kind(), seq = ?message.sequence_number(), to = %addr, "send");
        self.send_to(&message.encode(), addr)
    }

    /// Receives one datagram into `buf`.
    ///
    /// Returns `Ok(None)` when the read timeout elapses without data.
    ///
    /// # Errors
    ///
    /// Returns socket errors other than timeouts.
    pub fn recv_from(&self, buf: &mut [u8]) -> NetResult<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok((len, addr)) => {
                self.stats.packets_received.fetch_add(1, Ordering::Relaxed);
                self.stats.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
                Ok(Some((len, addr)))
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => Ok(None),
            // Windows reports ICMP port-unreachable from an earlier send as a reset
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => Ok(None),
            Err(e) => {
                self.stats.recv_errors.fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }

    /// Returns a statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> TransportStats {
        TransportStats {
            packets_sent: self.stats.packets_sent.load(Ordering::Relaxed),
            packets_received: self.stats.packets_received.load(Ordering::Relaxed),
            bytes_sent: self.stats.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.stats.bytes_received.load(Ordering::Relaxed),
            send_errors: self.stats.send_errors.load(Ordering::Relaxed),
            recv_errors: self.stats.recv_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[test]
    fn test_send_and_receive() {
        let a = UdpTransport::bind(SocketAddr::new(LOOPBACK, 0)).unwrap();
        let b = UdpTransport::bind(SocketAddr::new(LOOPBACK, 0)).unwrap();
        b.set_read_timeout(Duration::from_secs(2)).unwrap();

        a.send_message(&Message::Ack { ack_number: 5 }, b.local_addr()).unwrap();

        let mut buf = [0u8; 512];
        let (len, from) = b.recv_from(&mut buf).unwrap().unwrap();
        assert_eq!(from, a.local_addr());
        assert_eq!(Message::decode(&buf[..len]).unwrap(), Message::Ack { ack_number: 5 });
        assert_eq!(a.stats().packets_sent, 1);
        assert_eq!(b.stats().packets_received, 1);
    }

    #[test]
    fn test_recv_timeout_is_none() {
        let a = UdpTransport::bind(SocketAddr::new(LOOPBACK, 0)).unwrap();
        a.set_read_timeout(Duration::from_millis(10)).unwrap();
        let mut buf = [0u8; 64];
        assert!(a.recv_from(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_fallback_moves_past_taken_port() {
        let taken = UdpTransport::bind(SocketAddr::new(LOOPBACK, 0)).unwrap();
        let port = taken.local_addr().port();

        match UdpTransport::bind_with_fallback(LOOPBACK, port, 10) {
            Ok(moved) => assert_ne!(moved.local_addr().port(), port),
            // Every neighbour may be taken on a busy host
            Err(NetError::BindExhausted { first_port, .. }) => assert_eq!(first_port, port),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fallback_exhausted_with_single_attempt() {
        let taken = UdpTransport::bind(SocketAddr::new(LOOPBACK, 0)).unwrap();
        let port = taken.local_addr().port();
        let err = UdpTransport::bind_with_fallback(LOOPBACK, port, 1).err().unwrap();
        assert!(matches!(err, NetError::BindExhausted { attempts: 1, .. }));
    }
}
