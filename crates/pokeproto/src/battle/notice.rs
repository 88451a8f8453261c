//! UI-facing battle notifications.

use std::fmt;

use pokeproto_core::Move;
use pokeproto_networking::CommunicationMode;

use super::resolution::Discrepancy;
use crate::chat::ChatLine;

/// Something the player should see. Sent on an optional channel; the
/// coordinator never blocks on it.
#[derive(Clone, Debug, PartialEq)]
pub enum BattleNotice {
    /// Setups exchanged.
    Started {
        /// Opposing trainer.
        opponent: String,
        /// Opposing combatant.
        opponent_pokemon: String,
        /// Fan-out mode.
        mode: CommunicationMode,
        /// Shared seed.
        seed: u64,
    },
    /// Choose a move.
    YourTurn {
        /// Available moves, 1-based in the prompt.
        moves: Vec<Move>,
        /// Own HP.
        hp: u32,
        /// Opponent's HP.
        opponent_hp: u32,
        /// Special-attack boosts left.
        attack_boosts: u8,
        /// Special-defense boosts left.
        defense_boosts: u8,
    },
    /// Waiting for the opponent's move.
    OpponentTurn {
        /// Opposing trainer.
        opponent: String,
    },
    /// A move selection was rejected.
    InvalidMove {
        /// Why.
        reason: String,
    },
    /// A special-defense boost is armed for the next special hit.
    DefenseArmed,
    /// A turn finished.
    TurnResolved {
        /// Status text.
        status: String,
        /// Own HP.
        hp: u32,
        /// Opponent's HP.
        opponent_hp: u32,
    },
    /// The two computations of a turn disagreed.
    Discrepancy(Discrepancy),
    /// A chat line arrived.
    Chat(ChatLine),
    /// A spectator started watching.
    SpectatorJoined {
        /// Spectator's name.
        name: String,
    },
    /// The match ended.
    GameOver {
        /// Winning trainer.
        winner: String,
        /// Losing trainer.
        loser: String,
    },
}

impl fmt::Display for BattleNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started {
                opponent,
                opponent_pokemon,
                mode,
                seed,
            } => write!(f, "=== BATTLE START === vs {opponent}'s {opponent_pokemon} (mode {mode}, seed {seed})"),
            Self::YourTurn {
                moves,
                hp,
                opponent_hp,
                attack_boosts,
                defense_boosts,
            } => {
                writeln!(f, "Your turn (HP {hp}, opponent HP {opponent_hp})")?;
                for (slot, m) in moves.iter().enumerate() {
                    writeln!(
                        f,
                        "  {}. {} (power {:.0}, {}, {:?})",
                        slot + 1,
                        m.name,
                        m.base_power,
                        m.element,
                        m.category
                    )?;
                }
                write!(f, "Boosts left: {attack_boosts} attack, {defense_boosts} defense")
            }
            Self::OpponentTurn { opponent } => write!(f, "Waiting for {opponent}..."),
            Self::InvalidMove { reason } => write!(f, "Invalid selection: {reason}"),
            Self::DefenseArmed => f.write_str("Special-defense boost armed"),
            Self::TurnResolved {
                status,
                hp,
                opponent_hp,
            } => write!(f, "{status} (HP {hp}, opponent HP {opponent_hp})"),
            Self::Discrepancy(d) => write!(f, "Calculation mismatch on {d}"),
            Self::Chat(line) => write!(f, "{line}"),
            Self::SpectatorJoined { name } => write!(f, "{name} is now watching"),
            Self::GameOver { winner, loser } => write!(f, "=== GAME OVER === {winner} defeated {loser}"),
        }
    }
}
