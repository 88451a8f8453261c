//! Joiner side of discovery and pairing.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use super::{DiscoveryConfig, HandshakeConfig};
use crate::error::{NetError, NetResult};
use crate::protocol::Message;
use crate::transport::{Inbound, UdpTransport};

/// A host that answered discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredHost {
    /// Advertised display name.
    pub name: String,
    /// Address the answer came from; used for all further traffic.
    pub addr: SocketAddr,
    /// Address as advertised by the host itself.
    pub advertised: String,
}

fn inbox_fault(reason: String) -> NetError {
    NetError::Io(std::io::Error::new(std::io::ErrorKind::Other, reason))
}

/// Probes every configured target and port, then collects answers for the
/// listen window. Later answers from the same name replace earlier ones.
///
/// # Errors
///
/// Socket failures reported by the reader. Failed probe sends are logged.
pub fn discover_hosts(
    transport: &UdpTransport,
    inbox: &Receiver<Inbound>,
    config: &DiscoveryConfig,
) -> NetResult<Vec<DiscoveredHost>> {
    if let Err(e) = transport.set_broadcast(true) {
        tracing::debug!(error = %e, "broadcast not available");
    }

    let probe = Message::FindingHost.encode();
    for ip in &config.targets {
        for port in config.ports() {
            let target = SocketAddr::new(*ip, port);
            if let Err(e) = transport.send_to(&probe, target) {
                tracing::debug!(%target, error = %e, "probe failed");
            }
        }
    }
    tracing::info!(window_ms = config.listen_window.as_millis() as u64, "looking for hosts");

    let deadline = Instant::now() + config.listen_window;
    let mut hosts: Vec<DiscoveredHost> = Vec::new();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match inbox.recv_timeout(remaining) {
            Ok(Inbound::Message {
                message: Message::IAmHosting { name, ip, port },
                from,
                ..
            }) => {
                tracing::info!(host = %name, %from, "host found");
                let found = DiscoveredHost {
                    name,
                    addr: from,
                    advertised: format!("{ip}:{port}"),
                };
                match hosts.iter_mut().find(|h| h.name == found.name) {
                    Some(slot) => *slot = found,
                    None => hosts.push(found),
                }
            }
            Ok(Inbound::Message { .. }) => {}
            Ok(Inbound::Fault(reason)) => return Err(inbox_fault(reason)),
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => return Err(NetError::InboxClosed),
        }
    }

    Ok(hosts)
}

/// Finds a host by name: exact match first, then ignoring ASCII case.
#[must_use]
pub fn find_host<'a>(hosts: &'a [DiscoveredHost], name: &str) -> Option<&'a DiscoveredHost> {
    hosts
        .iter()
        .find(|h| h.name == name)
        .or_else(|| hosts.iter().find(|h| h.name.eq_ignore_ascii_case(name)))
}

/// Discovers and picks one host: the named one, or the first to answer.
///
/// # Errors
///
/// [`NetError::DiscoveryTimeout`] when no matching host answered.
pub fn discover_host(
    transport: &UdpTransport,
    inbox: &Receiver<Inbound>,
    config: &DiscoveryConfig,
    name: Option<&str>,
) -> NetResult<DiscoveredHost> {
    let hosts = discover_hosts(transport, inbox, config)?;
    let chosen = match name {
        Some(name) => find_host(&hosts, name).cloned(),
        None => hosts.into_iter().next(),
    };
    chosen.ok_or(NetError::DiscoveryTimeout {
        window_ms: config.listen_window.as_millis() as u64,
    })
}

/// Asks `host` to pair, retrying per `config`. Returns the shared seed.
///
/// # Errors
///
/// [`NetError::HandshakeRejected`] on an explicit refusal,
/// [`NetError::HandshakeTimeout`] when no answer arrives at all.
pub fn request_handshake(
    transport: &UdpTransport,
    inbox: &Receiver<Inbound>,
    host: SocketAddr,
    name: &str,
    config: HandshakeConfig,
) -> NetResult<u64> {
    let request = Message::HandshakeRequest {
        name: name.to_string(),
    };
    let attempts = config.attempts.max(1);

    for attempt in 1..=attempts {
        transport.send_message(&request, host)?;
        tracing::debug!(attempt, %host, "handshake request sent");

        let deadline = Instant::now() + config.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining == Duration::ZERO {
                break;
            }
            match inbox.recv_timeout(remaining) {
                Ok(Inbound::Message { message, from, .. }) if from == host => match message {
                    Message::HandshakeResponse { seed } => {
                        tracing::info!(seed, %host, "handshake accepted");
                        return Ok(seed);
                    }
                    Message::HandshakeRejected => {
                        tracing::info!(%host, "handshake rejected");
                        return Err(NetError::HandshakeRejected);
                    }
                    other => tracing::trace!(kind = %other.kind(), "ignored during handshake"),
                },
                Ok(Inbound::Message { .. }) => {}
                Ok(Inbound::Fault(reason)) => return Err(inbox_fault(reason)),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return Err(NetError::InboxClosed),
            }
        }
        tracing::warn!(attempt, %host, "no handshake answer");
    }

    Err(NetError::HandshakeTimeout { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(name: &str) -> DiscoveredHost {
        DiscoveredHost {
            name: name.to_string(),
            addr: SocketAddr::from(([127, 0, 0, 1], 50000)),
            advertised: "0.0.0.0:50000".to_string(),
        }
    }

    #[test]
    fn test_find_host_prefers_exact() {
        let hosts = vec![host("ash"), host("Ash")];
        assert_eq!(find_host(&hosts, "Ash").unwrap().name, "Ash");
        assert_eq!(find_host(&hosts, "ASH").unwrap().name, "ash");
        assert!(find_host(&hosts, "Misty").is_none());
    }
}
