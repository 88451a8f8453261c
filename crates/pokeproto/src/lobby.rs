//! # Lobby
//!
//! Pairing glue for the three roles. Each entry point takes an already bound
//! socket and a [`PeerConfig`], starts the single reader thread that serves
//! both discovery and the battle, and hands over to the coordinator or the
//! spectator session.

use crossbeam_channel::{Receiver, Sender};
use pokeproto_networking::{
    discover_host, request_handshake, AcceptAll, HostListener, Inbox, PeerDescriptor, UdpTransport,
};

use crate::battle::{BattleLink, BattleNotice, BattleOutcome, FlagOnlyPolicy, LocalSetup, ResolutionPolicy, TurnCoordinator};
use crate::config::PeerConfig;
use crate::error::BattleResult;
use crate::input::PlayerCommand;
use crate::spectator::{SpectatorEvent, SpectatorSession, SpectatorView};

/// Per-match knobs that are not configuration.
pub struct MatchOptions {
    commands: Receiver<PlayerCommand>,
    notices: Option<Sender<BattleNotice>>,
    policy: Box<dyn ResolutionPolicy>,
    seed: Option<u64>,
}

impl MatchOptions {
    /// Player input arrives on `commands`.
    #[must_use]
    pub fn new(commands: Receiver<PlayerCommand>) -> Self {
        Self {
            commands,
            notices: None,
            policy: Box::new(FlagOnlyPolicy),
            seed: None,
        }
    }

    /// Publishes notices on `notices`.
    #[must_use]
    pub fn with_notices(mut self, notices: Sender<BattleNotice>) -> Self {
        self.notices = Some(notices);
        self
    }

    /// Discrepancy policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Box<dyn ResolutionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Fixed handshake seed (host only).
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn into_coordinator(self, coordinator: TurnCoordinator, config: &PeerConfig) -> TurnCoordinator {
        let coordinator = coordinator
            .with_policy(self.policy)
            .with_stickers(config.sticker_table());
        match self.notices {
            Some(notices) => coordinator.with_notices(notices),
            None => coordinator,
        }
    }
}

/// Binds the socket a peer uses for everything: the configured port, or the
/// discovery range when the port is 0 for a host.
///
/// # Errors
///
/// [`pokeproto_networking::NetError::BindExhausted`] when every candidate
/// port is taken.
pub fn bind_host(config: &PeerConfig) -> BattleResult<UdpTransport> {
    let port = if config.port == 0 {
        config.discovery.port_base
    } else {
        config.port
    };
    Ok(UdpTransport::bind_with_fallback(
        config.bind_ip,
        port,
        config.discovery.port_span.saturating_add(1),
    )?)
}

/// Binds an ephemeral socket for a joiner or spectator, unless a port is
/// configured.
///
/// # Errors
///
/// Socket errors.
pub fn bind_client(config: &PeerConfig) -> BattleResult<UdpTransport> {
    Ok(UdpTransport::bind_with_fallback(config.bind_ip, config.port, 1)?)
}

/// Advertises, pairs with the first admitted joiner and plays the match.
///
/// # Errors
///
/// Configuration, pairing and battle errors.
pub fn host_match(
    transport: UdpTransport,
    config: &PeerConfig,
    local: LocalSetup,
    options: MatchOptions,
) -> BattleResult<BattleOutcome> {
    let mode = config.communication_mode()?;
    let inbox = Inbox::spawn(transport.clone());

    let mut listener = HostListener::new(config.name.clone(), transport.clone());
    if let Some(seed) = options.seed {
        listener = listener.with_seed(seed);
    }
    let pairing = listener.wait_for_joiner(inbox.receiver(), &mut AcceptAll)?;
    tracing::info!(joiner = %pairing.joiner.name(), seed = pairing.seed, %mode, "starting match");

    let link = BattleLink::open(transport, inbox, config.channel_config(), config.sweep_interval());
    let commands = options.commands.clone();
    let coordinator = TurnCoordinator::host(link, local, pairing, mode, config.roster(), commands);
    options.into_coordinator(coordinator, config).run()
}

/// Finds a host (the named one, or the first to answer), pairs and plays.
///
/// # Errors
///
/// Discovery, handshake and battle errors.
pub fn join_match(
    transport: UdpTransport,
    config: &PeerConfig,
    local: LocalSetup,
    host_name: Option<&str>,
    options: MatchOptions,
) -> BattleResult<BattleOutcome> {
    let inbox = Inbox::spawn(transport.clone());
    let host = discover_host(&transport, inbox.receiver(), &config.discovery_config(), host_name)?;
    let seed = request_handshake(
        &transport,
        inbox.receiver(),
        host.addr,
        &config.name,
        config.handshake_config(),
    )?;
    tracing::info!(host = %host.name, addr = %host.addr, seed, "paired");

    let link = BattleLink::open(transport, inbox, config.channel_config(), config.sweep_interval());
    let peer = PeerDescriptor::remote(host.name, host.addr);
    let commands = options.commands.clone();
    let coordinator = TurnCoordinator::joiner(link, local, peer, seed, config.roster(), commands);
    options.into_coordinator(coordinator, config).run()
}

/// Finds a host and watches its match.
///
/// # Errors
///
/// Discovery errors, and errors from [`SpectatorSession::run`].
pub fn spectate(
    transport: UdpTransport,
    config: &PeerConfig,
    host_name: Option<&str>,
    commands: Receiver<PlayerCommand>,
    events: Option<Sender<SpectatorEvent>>,
) -> BattleResult<SpectatorView> {
    let inbox = Inbox::spawn(transport.clone());
    let host = discover_host(&transport, inbox.receiver(), &config.discovery_config(), host_name)?;
    tracing::info!(host = %host.name, addr = %host.addr, "watching");

    let view = SpectatorView::new(host.addr, config.sticker_table(), config.roster());
    let mut session = SpectatorSession::new(transport, inbox, config.name.clone(), view, commands);
    if let Some(events) = events {
        session = session.with_events(events);
    }
    session.join()?;
    session.run()
}
