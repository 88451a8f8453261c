//! # Core Error Types
//!
//! All errors that can occur while building combatants or resolving moves.

use thiserror::Error;

/// Errors that can occur in the combat math.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Combatant name not present in the roster.
    #[error("unknown combatant: {0}")]
    UnknownCombatant(String),

    /// Move name not present in the combatant's move list.
    #[error("{combatant} has no move named {name}")]
    UnknownMove {
        /// The combatant that was asked to use the move.
        combatant: String,
        /// The requested move name.
        name: String,
    },

    /// Move index outside the combatant's move list.
    #[error("move slot {index} out of range ({available} moves available)")]
    MoveSlotOutOfRange {
        /// The requested slot.
        index: usize,
        /// Number of moves the combatant knows.
        available: usize,
    },

    /// Boost allocation exceeds the per-match budget.
    #[error("boost allocation {attack}+{defense} exceeds the budget of {budget}")]
    InvalidBoostAllocation {
        /// Special-attack boost uses requested.
        attack: u8,
        /// Special-defense boost uses requested.
        defense: u8,
        /// Maximum combined uses.
        budget: u8,
    },

    /// Unrecognized elemental type tag.
    #[error("unknown element type: {0}")]
    UnknownElement(String),
}

/// Result type for combat math operations.
pub type CoreResult<T> = Result<T, CoreError>;
