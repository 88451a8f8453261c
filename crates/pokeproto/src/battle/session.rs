//! # Battle Session
//!
//! The state of one match: both participants and their combatants, the
//! shared random source, whose turn it is, the lifecycle state and an
//! append-only event log.
//!
//! ## Design
//!
//! The session is plain data owned by the coordinator that runs it. It does
//! no I/O. Both peers hold a session built from the same seed and the same
//! two setups, and both draw from the random source exactly once per turn,
//! which keeps their damage rolls aligned.

use std::fmt;

use pokeproto_core::{BattleRng, CombatantState};
use pokeproto_networking::{CommunicationMode, PeerDescriptor};

use super::resolution::Discrepancy;

/// Which end of the match a peer is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// The peer that advertised and accepted the handshake. Attacks first.
    Host,
    /// The peer that discovered the host.
    Joiner,
}

impl Side {
    /// The other side.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Host => Self::Joiner,
            Self::Joiner => Self::Host,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Host => "host",
            Self::Joiner => "joiner",
        })
    }
}

/// Coordinator state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Exchanging setups.
    Setup,
    /// The side on turn is choosing a move.
    WaitingForMove,
    /// Attacker waits for `DEFENSE_ANNOUNCE`.
    AwaitingDefense,
    /// Defender waits for `CALCULATION_REPORT`.
    AwaitingReport,
    /// Attacker waits for `CALCULATION_CONFIRM` or `RESOLUTION_REQUEST`.
    AwaitingConfirm,
    /// A combatant fainted or a side forfeited. Terminal.
    GameOver,
    /// Ended by an error. Terminal.
    Aborted,
}

impl Lifecycle {
    /// Whether no further transitions happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::GameOver | Self::Aborted)
    }
}

/// One side of the match.
#[derive(Clone, Debug)]
pub struct Participant {
    /// Trainer name and address.
    pub peer: PeerDescriptor,
    /// The combatant this trainer brought.
    pub combatant: CombatantState,
}

impl Participant {
    /// Pairs a trainer with a combatant.
    #[must_use]
    pub fn new(peer: PeerDescriptor, combatant: CombatantState) -> Self {
        Self { peer, combatant }
    }

    /// Trainer name.
    #[must_use]
    pub fn trainer(&self) -> &str {
        self.peer.name()
    }
}

/// One completed turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnRecord {
    /// Turn number (1-based).
    pub number: u32,
    /// Side that attacked.
    pub attacker_side: Side,
    /// Attacking combatant.
    pub attacker: String,
    /// Move used.
    pub move_used: String,
    /// Damage applied.
    pub damage: u32,
    /// Defender HP after the turn.
    pub defender_hp: u32,
    /// Status text from the report.
    pub status: String,
}

/// Append-only session log entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BattleEvent {
    /// Setups exchanged, battle begins.
    Started {
        /// Shared seed.
        seed: u64,
        /// Fan-out mode.
        mode: CommunicationMode,
    },
    /// A spectator was admitted mid-match.
    SpectatorJoined {
        /// Spectator's name.
        name: String,
    },
    /// A turn completed.
    Turn(TurnRecord),
    /// The two computations of a turn disagreed.
    Discrepancy(Discrepancy),
    /// A chat line was shown.
    Chat {
        /// Author.
        sender: String,
        /// Rendered text.
        text: String,
    },
    /// The match ended.
    GameOver {
        /// Winning trainer.
        winner: String,
        /// Losing trainer.
        loser: String,
    },
}

impl fmt::Display for BattleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { seed, mode } => write!(f, "battle started (seed {seed}, mode {mode})"),
            Self::SpectatorJoined { name } => write!(f, "{name} is watching"),
            Self::Turn(turn) => write!(f, "turn {}: {}", turn.number, turn.status),
            Self::Discrepancy(d) => write!(f, "discrepancy on {d}"),
            Self::Chat { sender, text } => write!(f, "[{sender}] {text}"),
            Self::GameOver { winner, loser } => write!(f, "{winner} defeated {loser}"),
        }
    }
}

/// How a finished match ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BattleOutcome {
    /// Winning trainer.
    pub winner: String,
    /// Losing trainer.
    pub loser: String,
    /// Completed turns.
    pub turns: u32,
    /// Whether the loser quit instead of fainting.
    pub forfeit: bool,
    /// The session's event log.
    pub log: Vec<BattleEvent>,
}

/// State of one match as seen by one peer.
#[derive(Debug)]
pub struct BattleSession {
    local_side: Side,
    host: Participant,
    joiner: Participant,
    seed: u64,
    rng: BattleRng,
    mode: CommunicationMode,
    turn: Side,
    completed_turns: u32,
    lifecycle: Lifecycle,
    log: Vec<BattleEvent>,
}

impl BattleSession {
    /// Creates a session in [`Lifecycle::Setup`] with the host on turn.
    #[must_use]
    pub fn new(
        local_side: Side,
        local: Participant,
        opponent: Participant,
        seed: u64,
        mode: CommunicationMode,
    ) -> Self {
        let (host, joiner) = match local_side {
            Side::Host => (local, opponent),
            Side::Joiner => (opponent, local),
        };
        Self {
            local_side,
            host,
            joiner,
            seed,
            rng: BattleRng::from_seed(seed),
            mode,
            turn: Side::Host,
            completed_turns: 0,
            lifecycle: Lifecycle::Setup,
            log: Vec::new(),
        }
    }

    /// Leaves setup: the host is on turn and waits for a move.
    pub fn begin(&mut self) {
        self.lifecycle = Lifecycle::WaitingForMove;
        self.log.push(BattleEvent::Started {
            seed: self.seed,
            mode: self.mode,
        });
        tracing::info!(seed = self.seed, mode = %self.mode, side = %self.local_side, "battle started");
    }

    /// This peer's side.
    #[must_use]
    pub const fn local_side(&self) -> Side {
        self.local_side
    }

    /// Participant on `side`.
    #[must_use]
    pub const fn participant(&self, side: Side) -> &Participant {
        match side {
            Side::Host => &self.host,
            Side::Joiner => &self.joiner,
        }
    }

    /// Mutable participant on `side`.
    pub fn participant_mut(&mut self, side: Side) -> &mut Participant {
        match side {
            Side::Host => &mut self.host,
            Side::Joiner => &mut self.joiner,
        }
    }

    /// This peer's participant.
    #[must_use]
    pub const fn local(&self) -> &Participant {
        self.participant(self.local_side)
    }

    /// The other peer's participant.
    #[must_use]
    pub const fn opponent(&self) -> &Participant {
        self.participant(self.local_side.other())
    }

    /// Shared seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Fan-out mode.
    #[must_use]
    pub const fn mode(&self) -> CommunicationMode {
        self.mode
    }

    /// Side on turn.
    #[must_use]
    pub const fn current_turn(&self) -> Side {
        self.turn
    }

    /// Whether this peer attacks next.
    #[must_use]
    pub fn is_local_turn(&self) -> bool {
        self.turn == self.local_side
    }

    /// Number of the turn in progress (1-based).
    #[must_use]
    pub const fn turn_number(&self) -> u32 {
        self.completed_turns + 1
    }

    /// Completed turns.
    #[must_use]
    pub const fn completed_turns(&self) -> u32 {
        self.completed_turns
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Moves the state machine. Terminal states stick.
    pub fn transition(&mut self, next: Lifecycle) {
        if self.lifecycle.is_terminal() {
            return;
        }
        if self.lifecycle != next {
            tracing::debug!(from = ?self.lifecycle, to = ?next, "lifecycle");
            self.lifecycle = next;
        }
    }

    /// Draws the turn's random factor.
    pub fn next_draw(&mut self) -> f64 {
        self.rng.next_draw()
    }

    /// Draws taken so far.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.rng.draws()
    }

    /// Records a finished turn and hands the turn to the other side.
    pub fn complete_turn(&mut self, record: TurnRecord) {
        self.completed_turns += 1;
        self.turn = self.turn.other();
        self.log.push(BattleEvent::Turn(record));
        if !self.lifecycle.is_terminal() {
            self.lifecycle = Lifecycle::WaitingForMove;
        }
    }

    /// Appends to the event log.
    pub fn record(&mut self, event: BattleEvent) {
        self.log.push(event);
    }

    /// The event log.
    #[must_use]
    pub fn events(&self) -> &[BattleEvent] {
        &self.log
    }

    /// Ends the match and builds the outcome.
    pub fn finish(&mut self, winner: String, loser: String, forfeit: bool) -> BattleOutcome {
        self.lifecycle = Lifecycle::GameOver;
        self.log.push(BattleEvent::GameOver {
            winner: winner.clone(),
            loser: loser.clone(),
        });
        tracing::info!(%winner, %loser, turns = self.completed_turns, forfeit, "game over");
        BattleOutcome {
            winner,
            loser,
            turns: self.completed_turns,
            forfeit,
            log: self.log.clone(),
        }
    }

    /// Marks the session as ended by an error.
    pub fn abort(&mut self) {
        self.lifecycle = Lifecycle::Aborted;
    }
}
