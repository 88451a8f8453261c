//! # Battle Setup Exchange
//!
//! After pairing, each side announces its combatant and boost split. The
//! host goes first with `COMM_MODE` and `BATTLE_SETUP`; the joiner answers
//! with its own `BATTLE_SETUP` once it knows the mode.
//!
//! ## Design
//!
//! [`SetupExchange`] is a pure state machine: it consumes the peer's setup
//! messages and returns the messages to send back, leaving I/O to the
//! dispatcher. A side resends on its own timer only while it still lacks the
//! peer's setup. Duplicates of the peer's setup are answered with our own a
//! bounded number of times, so a lost answer is repaired without the two
//! sides bouncing setups at each other forever.

use pokeproto_core::{BoostAllocation, CombatantState, CoreResult, Roster};
use pokeproto_networking::{BattleSetup, CommunicationMode, Message};

/// Duplicate peer setups answered per match.
pub const DUPLICATE_SETUP_REPLIES: u32 = 3;

/// What this peer brings to the match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalSetup {
    /// Trainer display name.
    pub trainer: String,
    /// Roster name of the combatant.
    pub pokemon: String,
    /// Special boost split.
    pub boosts: BoostAllocation,
}

impl LocalSetup {
    /// Creates a setup.
    #[must_use]
    pub fn new(trainer: impl Into<String>, pokemon: impl Into<String>, boosts: BoostAllocation) -> Self {
        Self {
            trainer: trainer.into(),
            pokemon: pokemon.into(),
            boosts,
        }
    }

    /// The `BATTLE_SETUP` payload under `mode`.
    #[must_use]
    pub fn announcement(&self, mode: CommunicationMode) -> BattleSetup {
        BattleSetup {
            communication_mode: mode,
            pokemon_name: self.pokemon.clone(),
            special_attack_uses: self.boosts.special_attack_uses(),
            special_defense_uses: self.boosts.special_defense_uses(),
        }
    }

    /// Instantiates the local combatant.
    ///
    /// # Errors
    ///
    /// [`pokeproto_core::CoreError::UnknownCombatant`] when the roster lacks it.
    pub fn combatant(&self, roster: &Roster) -> CoreResult<CombatantState> {
        Ok(roster.lookup(&self.pokemon)?.with_boosts(self.boosts))
    }
}

/// Instantiates the combatant a peer announced.
///
/// # Errors
///
/// [`pokeproto_core::CoreError::InvalidBoostAllocation`] for an
/// over-budget split, [`pokeproto_core::CoreError::UnknownCombatant`] for a
/// name missing from `roster`.
pub fn resolve_setup(roster: &Roster, setup: &BattleSetup) -> CoreResult<CombatantState> {
    let boosts = BoostAllocation::new(setup.special_attack_uses, setup.special_defense_uses)?;
    Ok(roster.lookup(&setup.pokemon_name)?.with_boosts(boosts))
}

/// Result of receiving the peer's setup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerSetupReceipt {
    /// First copy (false for duplicates).
    pub first: bool,
    /// Messages to send back.
    pub replies: Vec<Message>,
}

/// Setup progress for one side.
#[derive(Clone, Debug)]
pub struct SetupExchange {
    local: LocalSetup,
    is_host: bool,
    mode: Option<CommunicationMode>,
    own_sent: bool,
    peer: Option<BattleSetup>,
    duplicate_replies_left: u32,
}

impl SetupExchange {
    /// Host side: the mode is known from the start.
    #[must_use]
    pub const fn host(local: LocalSetup, mode: CommunicationMode) -> Self {
        Self {
            local,
            is_host: true,
            mode: Some(mode),
            own_sent: false,
            peer: None,
            duplicate_replies_left: DUPLICATE_SETUP_REPLIES,
        }
    }

    /// Joiner side: learns the mode from the host.
    #[must_use]
    pub const fn joiner(local: LocalSetup) -> Self {
        Self {
            local,
            is_host: false,
            mode: None,
            own_sent: false,
            peer: None,
            duplicate_replies_left: DUPLICATE_SETUP_REPLIES,
        }
    }

    /// Fan-out mode, once known.
    #[must_use]
    pub const fn mode(&self) -> Option<CommunicationMode> {
        self.mode
    }

    /// Our own announcement, once the mode is known.
    #[must_use]
    pub fn own_setup(&self) -> Option<BattleSetup> {
        self.mode.map(|mode| self.local.announcement(mode))
    }

    /// The peer's announcement, once received.
    #[must_use]
    pub const fn peer_setup(&self) -> Option<&BattleSetup> {
        self.peer.as_ref()
    }

    /// Both setups exchanged.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.own_sent && self.peer.is_some()
    }

    fn own_message(&self) -> Option<Message> {
        self.own_setup().map(Message::BattleSetup)
    }

    fn host_opening(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if let Some(mode) = self.mode {
            messages.push(Message::CommMode { mode });
        }
        messages.extend(self.own_message());
        messages
    }

    /// Messages that open the exchange. Empty for the joiner, which waits
    /// for the mode.
    pub fn opening(&mut self) -> Vec<Message> {
        if !self.is_host {
            return Vec::new();
        }
        self.own_sent = true;
        self.host_opening()
    }

    /// Messages to resend when the peer's setup is overdue.
    #[must_use]
    pub fn resend(&self) -> Vec<Message> {
        if self.is_host {
            self.host_opening()
        } else if self.own_sent {
            self.own_message().into_iter().collect()
        } else {
            Vec::new()
        }
    }

    /// Handles `COMM_MODE`. Only the joiner acts on it.
    pub fn on_comm_mode(&mut self, mode: CommunicationMode) -> Vec<Message> {
        if self.is_host {
            return Vec::new();
        }
        if self.mode.is_none() {
            tracing::info!(%mode, "communication mode from host");
            self.mode = Some(mode);
        }
        self.send_own_once()
    }

    /// Handles the peer's `BATTLE_SETUP`.
    pub fn on_peer_setup(&mut self, setup: BattleSetup) -> PeerSetupReceipt {
        if self.peer.is_some() {
            let replies = if self.own_sent && self.duplicate_replies_left > 0 {
                self.duplicate_replies_left -= 1;
                self.own_message().into_iter().collect()
            } else {
                Vec::new()
            };
            return PeerSetupReceipt { first: false, replies };
        }

        if !self.is_host && self.mode.is_none() {
            self.mode = Some(setup.communication_mode);
        }
        tracing::info!(pokemon = %setup.pokemon_name, "peer setup received");
        self.peer = Some(setup);
        PeerSetupReceipt {
            first: true,
            replies: self.send_own_once(),
        }
    }

    fn send_own_once(&mut self) -> Vec<Message> {
        if self.own_sent {
            return Vec::new();
        }
        match self.own_message() {
            Some(message) => {
                self.own_sent = true;
                vec![message]
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pokeproto_core::CoreError;

    fn local(trainer: &str, pokemon: &str) -> LocalSetup {
        LocalSetup::new(trainer, pokemon, BoostAllocation::new(3, 2).unwrap())
    }

    fn setups(messages: &[Message]) -> usize {
        messages
            .iter()
            .filter(|m| matches!(m, Message::BattleSetup(_)))
            .count()
    }

    #[test]
    fn test_host_opens_with_mode_then_setup() {
        let mut host = SetupExchange::host(local("Red", "Charizard"), CommunicationMode::Broadcast);
        let opening = host.opening();
        assert_eq!(opening.len(), 2);
        assert_eq!(opening[0], Message::CommMode { mode: CommunicationMode::Broadcast });
        match &opening[1] {
            Message::BattleSetup(setup) => {
                assert_eq!(setup.pokemon_name, "Charizard");
                assert_eq!(setup.special_attack_uses, 3);
                assert_eq!(setup.communication_mode, CommunicationMode::Broadcast);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!host.is_complete());
    }

    #[test]
    fn test_joiner_waits_for_mode() {
        let mut joiner = SetupExchange::joiner(local("Blue", "Blastoise"));
        assert!(joiner.opening().is_empty());
        assert!(joiner.resend().is_empty());

        let replies = joiner.on_comm_mode(CommunicationMode::Broadcast);
        assert_eq!(setups(&replies), 1);
        assert_eq!(joiner.own_setup().unwrap().communication_mode, CommunicationMode::Broadcast);

        // A second COMM_MODE does not trigger another setup
        assert!(joiner.on_comm_mode(CommunicationMode::Broadcast).is_empty());
    }

    #[test]
    fn test_joiner_takes_mode_from_host_setup() {
        let mut host = SetupExchange::host(local("Red", "Charizard"), CommunicationMode::Broadcast);
        let mut joiner = SetupExchange::joiner(local("Blue", "Blastoise"));
        let Message::BattleSetup(host_setup) = host.opening().remove(1) else {
            panic!("expected setup");
        };

        // COMM_MODE was lost; the setup alone is enough
        let receipt = joiner.on_peer_setup(host_setup);
        assert!(receipt.first);
        assert_eq!(setups(&receipt.replies), 1);
        assert_eq!(joiner.mode(), Some(CommunicationMode::Broadcast));
        assert!(joiner.is_complete());
    }

    #[test]
    fn test_full_exchange_completes_both_sides() {
        let mut host = SetupExchange::host(local("Red", "Charizard"), CommunicationMode::PeerToPeer);
        let mut joiner = SetupExchange::joiner(local("Blue", "Blastoise"));

        let mut to_joiner = host.opening();
        let mut to_host = Vec::new();
        for message in to_joiner.drain(..) {
            match message {
                Message::CommMode { mode } => to_host.extend(joiner.on_comm_mode(mode)),
                Message::BattleSetup(setup) => to_host.extend(joiner.on_peer_setup(setup).replies),
                _ => {}
            }
        }
        for message in to_host {
            if let Message::BattleSetup(setup) = message {
                assert!(host.on_peer_setup(setup).replies.is_empty());
            }
        }

        assert!(host.is_complete());
        assert!(joiner.is_complete());
        assert_eq!(host.peer_setup().unwrap().pokemon_name, "Blastoise");
        assert_eq!(joiner.peer_setup().unwrap().pokemon_name, "Charizard");
    }

    #[test]
    fn test_duplicate_answers_are_bounded() {
        let mut host = SetupExchange::host(local("Red", "Charizard"), CommunicationMode::PeerToPeer);
        host.opening();
        let joiner_setup = local("Blue", "Blastoise").announcement(CommunicationMode::PeerToPeer);

        assert!(host.on_peer_setup(joiner_setup.clone()).first);
        let mut answered = 0;
        for _ in 0..10 {
            let receipt = host.on_peer_setup(joiner_setup.clone());
            assert!(!receipt.first);
            answered += setups(&receipt.replies);
        }
        assert_eq!(answered, DUPLICATE_SETUP_REPLIES as usize);
    }

    #[test]
    fn test_resolve_setup_checks_roster_and_budget() {
        let roster = Roster::builtin();
        let ok = resolve_setup(&roster, &local("Blue", "squirtle").announcement(CommunicationMode::PeerToPeer)).unwrap();
        assert_eq!(ok.name(), "Squirtle");
        assert_eq!(ok.boosts().special_attack_uses(), 3);

        let unknown = local("Blue", "Missingno").announcement(CommunicationMode::PeerToPeer);
        assert!(matches!(resolve_setup(&roster, &unknown), Err(CoreError::UnknownCombatant(_))));

        let mut greedy = local("Blue", "Squirtle").announcement(CommunicationMode::PeerToPeer);
        greedy.special_attack_uses = 9;
        greedy.special_defense_uses = 9;
        assert!(matches!(
            resolve_setup(&roster, &greedy),
            Err(CoreError::InvalidBoostAllocation { .. })
        ));
    }
}
