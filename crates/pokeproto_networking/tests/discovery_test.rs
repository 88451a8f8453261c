//! Loopback tests for discovery, pairing, and the ACK path.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pokeproto_networking::{
    discover_host, discover_hosts, request_handshake, request_spectate, AcceptAll, ChannelConfig,
    DiscoveryConfig, HandshakeConfig, HostListener, Inbound, Inbox, Message, NetError, ReliableChannel,
    UdpTransport,
};

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn bind() -> UdpTransport {
    UdpTransport::bind(SocketAddr::new(LOOPBACK, 0)).unwrap()
}

fn discovery_for(port: u16) -> DiscoveryConfig {
    DiscoveryConfig {
        port_base: port,
        port_span: 0,
        listen_window: Duration::from_millis(400),
        targets: vec![LOOPBACK],
    }
}

fn quick_handshake() -> HandshakeConfig {
    HandshakeConfig {
        timeout: Duration::from_millis(300),
        attempts: 3,
    }
}

#[test]
fn test_discover_and_pair_with_fixed_seed() {
    let host_transport = bind();
    let host_port = host_transport.local_addr().port();
    let host_inbox = Inbox::spawn(host_transport.clone());

    let host = thread::spawn(move || {
        let mut listener = HostListener::new("Red", host_transport).with_seed(42);
        let pairing = listener.wait_for_joiner(host_inbox.receiver(), &mut AcceptAll).unwrap();
        (pairing.joiner.name().to_string(), pairing.seed, pairing.spectators.len())
    });

    // A spectator registers before the joiner pairs
    let spectator = bind();
    let found = discover_host(&spectator, Inbox::spawn(spectator.clone()).receiver(), &discovery_for(host_port), Some("red"))
        .unwrap();
    request_spectate(&spectator, found.addr, "Watcher").unwrap();

    let joiner = bind();
    let joiner_inbox = Inbox::spawn(joiner.clone());
    let hosts = discover_hosts(&joiner, joiner_inbox.receiver(), &discovery_for(host_port)).unwrap();
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].name, "Red");
    assert_eq!(hosts[0].addr.port(), host_port);

    let seed = request_handshake(&joiner, joiner_inbox.receiver(), hosts[0].addr, "Blue", quick_handshake()).unwrap();
    assert_eq!(seed, 42);

    let (joiner_name, host_seed, spectators) = host.join().unwrap();
    assert_eq!(joiner_name, "Blue");
    assert_eq!(host_seed, 42);
    assert_eq!(spectators, 1);
}

#[test]
fn test_rejection_is_not_a_timeout() {
    let host_transport = bind();
    let host_addr = host_transport.local_addr();
    let host_inbox = Inbox::spawn(host_transport.clone());

    let host = thread::spawn(move || {
        let mut listener = HostListener::new("Red", host_transport);
        let mut refuse = |_: &str, _: SocketAddr| false;
        // Process exactly one request, then stop
        if let Ok(Inbound::Message { message, from, .. }) = host_inbox.receiver().recv_timeout(Duration::from_secs(2)) {
            listener.handle(&message, from, &mut refuse).unwrap();
        }
    });

    let joiner = bind();
    let joiner_inbox = Inbox::spawn(joiner.clone());
    let err = request_handshake(&joiner, joiner_inbox.receiver(), host_addr, "Blue", quick_handshake()).unwrap_err();
    assert!(matches!(err, NetError::HandshakeRejected), "got {err}");

    host.join().unwrap();
}

#[test]
fn test_silent_host_times_out() {
    let silent = bind();
    let joiner = bind();
    let joiner_inbox = Inbox::spawn(joiner.clone());
    let config = HandshakeConfig {
        timeout: Duration::from_millis(50),
        attempts: 2,
    };
    let err = request_handshake(&joiner, joiner_inbox.receiver(), silent.local_addr(), "Blue", config).unwrap_err();
    assert!(matches!(err, NetError::HandshakeTimeout { attempts: 2 }), "got {err}");
}

#[test]
fn test_no_host_found() {
    let silent = bind();
    let joiner = bind();
    let joiner_inbox = Inbox::spawn(joiner.clone());
    let mut config = discovery_for(silent.local_addr().port());
    config.listen_window = Duration::from_millis(100);
    let err = discover_host(&joiner, joiner_inbox.receiver(), &config, None).unwrap_err();
    assert!(matches!(err, NetError::DiscoveryTimeout { window_ms: 100 }));
}

#[test]
fn test_reliable_send_is_acked_over_the_wire() {
    let a = bind();
    let b = bind();
    let channel_a = Arc::new(ReliableChannel::new(a.clone(), ChannelConfig::default()));
    let channel_b = ReliableChannel::new(b.clone(), ChannelConfig::default());
    let inbox_a = Inbox::spawn(a.clone());
    let inbox_b = Inbox::spawn(b);

    let seq = channel_a
        .send_reliable(Message::CalculationConfirm { sequence_number: 0 }, a_peer(&channel_b))
        .unwrap();
    assert!(channel_a.is_pending(seq));

    match inbox_b.receiver().recv_timeout(Duration::from_secs(2)).unwrap() {
        Inbound::Message { message, from, .. } => {
            assert_eq!(message.sequence_number(), Some(seq));
            channel_b.send_ack(seq, from).unwrap();
        }
        Inbound::Fault(e) => panic!("fault: {e}"),
    }

    match inbox_a.receiver().recv_timeout(Duration::from_secs(2)).unwrap() {
        Inbound::Message { message: Message::Ack { ack_number }, .. } => {
            assert!(channel_a.receive_ack(ack_number));
        }
        other => panic!("expected ACK, got {other:?}"),
    }
    assert_eq!(channel_a.pending_count(), 0);
}

fn a_peer(channel: &ReliableChannel) -> SocketAddr {
    channel.transport().local_addr()
}
