//! Full matches between real coordinators over loopback UDP.

use std::net::{IpAddr, Ipv4Addr};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use pokeproto::{
    host_match, join_match, spectate, AttackerWinsPolicy, BattleError, BattleEvent, BattleNotice, BattleOutcome,
    BattleResult, LocalSetup, MatchOptions, PeerConfig, PlayerCommand, SpectatorEvent, SpectatorView,
};
use pokeproto_core::{BaseStats, ElementType, RosterEntry};
use pokeproto_networking::{AcceptAll, CommunicationMode, HostListener, Inbound, Inbox, Message, UdpTransport};

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const MATCH_DEADLINE: Duration = Duration::from_secs(30);

fn bind() -> UdpTransport {
    UdpTransport::bind((LOOPBACK, 0).into()).unwrap()
}

fn config(name: &str, pokemon: &str) -> PeerConfig {
    let mut config = PeerConfig::default();
    config.name = name.to_string();
    config.bind_ip = LOOPBACK;
    config.battle.pokemon = pokemon.to_string();
    config.reliability.timeout_ms = 200;
    config.reliability.max_retries = 5;
    config.reliability.sweep_interval_ms = 50;
    config.handshake.timeout_ms = 300;
    config.discovery.listen_window_ms = 300;
    config
}

fn pointed_at(mut config: PeerConfig, host_port: u16) -> PeerConfig {
    config.discovery.port_base = host_port;
    config.discovery.port_span = 0;
    config.discovery.targets = vec![LOOPBACK];
    config
}

fn local(config: &PeerConfig) -> LocalSetup {
    LocalSetup::new(config.name.clone(), config.battle.pokemon.clone(), config.boosts().unwrap())
}

/// A command channel preloaded with `count` first-slot moves.
fn tackles(count: usize) -> Receiver<PlayerCommand> {
    let (sender, receiver) = unbounded();
    for _ in 0..count {
        sender
            .send(PlayerCommand::SelectMove { index: 0, boost: false })
            .unwrap();
    }
    receiver
}

fn feed_tackles(sender: &Sender<PlayerCommand>, count: usize) {
    for _ in 0..count {
        sender
            .send(PlayerCommand::SelectMove { index: 0, boost: false })
            .unwrap();
    }
}

/// Runs `work` on a thread and hands its result back on a channel, so a
/// wedged match fails the test instead of hanging it.
fn background<T, F>(work: F) -> Receiver<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = unbounded();
    thread::spawn(move || {
        let _ = sender.send(work());
    });
    receiver
}

fn start_host(config: PeerConfig, options: MatchOptions) -> (u16, Receiver<BattleResult<BattleOutcome>>) {
    let transport = bind();
    let port = transport.local_addr().port();
    let setup = local(&config);
    let result = background(move || host_match(transport, &config, setup, options.with_seed(42)));
    (port, result)
}

fn start_joiner(config: PeerConfig, options: MatchOptions) -> Receiver<BattleResult<BattleOutcome>> {
    let setup = local(&config);
    background(move || join_match(bind(), &config, setup, Some("Red"), options))
}

fn start_spectator(
    config: PeerConfig,
    commands: Receiver<PlayerCommand>,
) -> (Receiver<SpectatorEvent>, Receiver<BattleResult<SpectatorView>>) {
    let (events, seen) = unbounded();
    let result = background(move || spectate(bind(), &config, Some("Red"), commands, Some(events)));
    (seen, result)
}

fn finished<T>(result: &Receiver<T>) -> T {
    result.recv_timeout(MATCH_DEADLINE).expect("match did not finish")
}

/// Waits until `events` yields something matching `wanted`.
fn wait_for<T>(events: &Receiver<T>, within: Duration, wanted: impl Fn(&T) -> bool) -> Option<T> {
    let deadline = Instant::now() + within;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(event) if wanted(&event) => return Some(event),
            Ok(_) => {}
            Err(_) => return None,
        }
    }
}

fn turn_count(outcome: &BattleOutcome) -> usize {
    outcome
        .log
        .iter()
        .filter(|e| matches!(e, BattleEvent::Turn(_)))
        .count()
}

#[test]
fn test_full_battle_both_sides_agree() {
    let (host_port, host) = start_host(config("Red", "Charizard"), MatchOptions::new(tackles(40)));
    let joiner = start_joiner(
        pointed_at(config("Blue", "Blastoise"), host_port),
        MatchOptions::new(tackles(40)),
    );

    let host = finished(&host).unwrap();
    let joiner = finished(&joiner).unwrap();

    assert_eq!(host.winner, joiner.winner);
    assert_eq!(host.loser, joiner.loser);
    assert_eq!(host.turns, joiner.turns);
    assert!(host.turns >= 2);
    assert!(!host.forfeit && !joiner.forfeit);
    assert_eq!(turn_count(&host), host.turns as usize);

    let names = [host.winner.as_str(), host.loser.as_str()];
    assert!(names.contains(&"Red") && names.contains(&"Blue"));

    // Both logs describe the same turns
    let statuses = |outcome: &BattleOutcome| -> Vec<String> {
        outcome
            .log
            .iter()
            .filter_map(|e| match e {
                BattleEvent::Turn(turn) => Some(turn.status.clone()),
                _ => None,
            })
            .collect()
    };
    assert_eq!(statuses(&host), statuses(&joiner));
}

#[test]
fn test_forfeit_ends_match_for_both() {
    let (host_port, host) = start_host(config("Red", "Pikachu"), MatchOptions::new(tackles(0)));

    // The joiner quits before the first turn
    let (joiner_commands, commands) = unbounded();
    joiner_commands.send(PlayerCommand::Quit).unwrap();
    let joiner = start_joiner(
        pointed_at(config("Blue", "Eevee"), host_port),
        MatchOptions::new(commands),
    );

    let joiner = finished(&joiner).unwrap();
    assert!(joiner.forfeit);
    assert_eq!(joiner.winner, "Red");
    assert_eq!(joiner.loser, "Blue");

    let host = finished(&host).unwrap();
    assert!(host.forfeit);
    assert_eq!(host.winner, "Red");
    assert_eq!(host.turns, 0);
}

fn desynced_joiner(host_port: u16) -> PeerConfig {
    // The joiner believes the host's Charizard hits far harder than it does
    let mut config = pointed_at(config("Blue", "Blastoise"), host_port);
    config.roster.push(RosterEntry {
        name: "Charizard".into(),
        hp: 78,
        stats: BaseStats {
            attack: 200,
            defense: 78,
            special_attack: 109,
            special_defense: 85,
        },
        primary: ElementType::Fire,
        secondary: Some(ElementType::Flying),
        moves: None,
    });
    config
}

#[test]
fn test_discrepancy_is_flagged_on_both_sides() {
    let (host_port, host) = start_host(config("Red", "Charizard"), MatchOptions::new(tackles(40)));
    let joiner = start_joiner(desynced_joiner(host_port), MatchOptions::new(tackles(40)));

    match finished(&joiner) {
        Err(BattleError::CalculationDiscrepancy(d)) => {
            assert_eq!(d.turn, 1);
            assert_eq!(d.attacker, "Charizard");
            assert!(d.defender_damage > d.attacker_damage);
        }
        other => panic!("joiner: unexpected {other:?}"),
    }
    match finished(&host) {
        Err(e @ BattleError::ResolutionRequested(_)) => assert!(e.is_discrepancy()),
        other => panic!("host: unexpected {other:?}"),
    }
}

#[test]
fn test_attacker_wins_policy_keeps_match_going() {
    let (host_port, host) = start_host(
        config("Red", "Charizard"),
        MatchOptions::new(tackles(40)).with_policy(Box::new(AttackerWinsPolicy)),
    );
    let joiner = start_joiner(
        desynced_joiner(host_port),
        MatchOptions::new(tackles(40)).with_policy(Box::new(AttackerWinsPolicy)),
    );

    let host = finished(&host).unwrap();
    let joiner = finished(&joiner).unwrap();
    assert_eq!(host.winner, joiner.winner);
    assert_eq!(host.turns, joiner.turns);
    assert!(joiner.log.iter().any(|e| matches!(e, BattleEvent::Discrepancy(_))));
}

fn spectated_battle(mode: &str) {
    let mut host_config = config("Red", "Charizard");
    host_config.battle.mode = mode.to_string();
    let (host_port, host) = start_host(host_config, MatchOptions::new(tackles(40)));

    // The spectator registers while the host is still waiting for a joiner
    let (_quit, commands) = unbounded();
    let (events, view) = start_spectator(pointed_at(config("Watcher", "Pikachu"), host_port), commands);
    thread::sleep(Duration::from_millis(800));

    let joiner = start_joiner(
        pointed_at(config("Blue", "Blastoise"), host_port),
        MatchOptions::new(tackles(40)),
    );

    let host = finished(&host).unwrap();
    let joiner = finished(&joiner).unwrap();
    let view = finished(&view).unwrap();
    let seen: Vec<SpectatorEvent> = events.try_iter().collect();

    assert_eq!(host.winner, joiner.winner);
    assert_eq!(view.result(), Some((host.winner.as_str(), host.loser.as_str())));
    assert_eq!(view.combatants().len(), 2);
    assert_eq!(view.turns_reported(), host.turns);

    assert!(seen.iter().any(|e| matches!(e, SpectatorEvent::MoveAnnounced { .. })));
    assert!(seen.iter().any(|e| matches!(e, SpectatorEvent::TurnReported { .. })));
    assert!(matches!(seen.last(), Some(SpectatorEvent::GameOver { .. })));
}

#[test]
fn test_spectator_sees_peer_to_peer_match() {
    spectated_battle("P");
}

#[test]
fn test_spectator_sees_broadcast_match() {
    spectated_battle("B");
}

fn chat_from(notice: &BattleNotice, sender: &str) -> bool {
    matches!(notice, BattleNotice::Chat(line) if line.sender == sender)
}

fn chat_routing(mode: &str) -> bool {
    let mut host_config = config("Red", "Charizard");
    host_config.battle.mode = mode.to_string();
    let (host_moves, host_commands) = unbounded();
    let (host_port, host) = start_host(host_config, MatchOptions::new(host_commands));

    let (spectator_input, spectator_commands) = unbounded();
    let (events, view) = start_spectator(pointed_at(config("Watcher", "Pikachu"), host_port), spectator_commands);
    thread::sleep(Duration::from_millis(800));

    let (joiner_input, joiner_commands) = unbounded();
    let (joiner_notices, notices) = unbounded();
    let joiner = start_joiner(
        pointed_at(config("Blue", "Blastoise"), host_port),
        MatchOptions::new(joiner_commands).with_notices(joiner_notices),
    );

    // Both setups reached the spectator, so the match is running
    for _ in 0..2 {
        wait_for(&events, Duration::from_secs(5), |e| {
            matches!(e, SpectatorEvent::CombatantJoined { .. })
        })
        .expect("setup mirrored");
    }

    spectator_input
        .send(PlayerCommand::Chat("hello from the stands".into()))
        .unwrap();
    let joiner_heard = wait_for(&notices, Duration::from_millis(600), |n| chat_from(n, "Watcher")).is_some();

    joiner_input.send(PlayerCommand::Chat("/gg".into())).unwrap();
    let relayed = wait_for(&events, Duration::from_secs(3), |e| {
        matches!(e, SpectatorEvent::Chat(line) if line.sender == "Blue")
    })
    .expect("joiner chat reaches the spectator");
    match relayed {
        SpectatorEvent::Chat(line) => {
            assert_eq!(line.text, "GG");
            assert!(line.sticker);
        }
        other => panic!("unexpected {other:?}"),
    }

    feed_tackles(&host_moves, 40);
    feed_tackles(&joiner_input, 40);
    let host = finished(&host).unwrap();
    let joiner = finished(&joiner).unwrap();
    assert_eq!(host.winner, joiner.winner);

    // The host logged the spectator's line in both modes
    assert!(host
        .log
        .iter()
        .any(|e| matches!(e, BattleEvent::Chat { sender, .. } if sender == "Watcher")));

    finished(&view).unwrap();
    joiner_heard
}

#[test]
fn test_spectator_chat_reaches_joiner_in_broadcast_mode() {
    assert!(chat_routing("B"));
}

#[test]
fn test_spectator_chat_stays_with_host_in_peer_to_peer_mode() {
    assert!(!chat_routing("P"));
}

fn is_inbound(inbound: &Inbound, wanted: impl Fn(&Message) -> bool) -> bool {
    matches!(inbound, Inbound::Message { message, .. } if wanted(message))
}

#[test]
fn test_game_over_during_setup_ends_the_match() {
    // A scripted host that concedes before its own setup is ever sent
    let host = bind();
    let host_port = host.local_addr().port();
    let inbox = Inbox::spawn(host.clone());
    let joiner = start_joiner(
        pointed_at(config("Blue", "Blastoise"), host_port),
        MatchOptions::new(tackles(0)),
    );

    let mut listener = HostListener::new("Red", host.clone()).with_seed(42);
    let pairing = listener.wait_for_joiner(inbox.receiver(), &mut AcceptAll).unwrap();
    let joiner_addr = pairing.joiner.addr();
    host.send_message(
        &Message::CommMode {
            mode: CommunicationMode::PeerToPeer,
        },
        joiner_addr,
    )
    .unwrap();

    let setup = wait_for(inbox.receiver(), Duration::from_secs(5), |inbound| {
        is_inbound(inbound, |m| matches!(m, Message::BattleSetup(_)))
    });
    assert!(setup.is_some(), "joiner never sent its setup");

    host.send_message(
        &Message::GameOver {
            winner: "Blue".into(),
            loser: "Red".into(),
            sequence_number: 1,
        },
        joiner_addr,
    )
    .unwrap();
    let acked = wait_for(inbox.receiver(), Duration::from_secs(5), |inbound| {
        is_inbound(inbound, |m| matches!(m, Message::Ack { ack_number: 1 }))
    });
    assert!(acked.is_some(), "GAME_OVER was not acked");

    let outcome = finished(&joiner).unwrap();
    assert_eq!(outcome.winner, "Blue");
    assert_eq!(outcome.loser, "Red");
    assert!(outcome.forfeit);
    assert_eq!(outcome.turns, 0);
    assert!(matches!(outcome.log.last(), Some(BattleEvent::GameOver { .. })));
}
