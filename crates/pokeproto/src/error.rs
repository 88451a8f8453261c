//! # Battle Error Types
//!
//! Everything that can end a session early. Wire and combat errors are
//! wrapped so callers match on one enum.

use pokeproto_core::CoreError;
use pokeproto_networking::{NetError, SequenceNumber};
use thiserror::Error;

use crate::battle::Discrepancy;

/// Errors that end or prevent a battle.
#[derive(Error, Debug)]
pub enum BattleError {
    /// A reliable message ran out of retries.
    #[error("reliable send {sequence} was never acknowledged")]
    SendFailed {
        /// The sequence number that failed.
        sequence: SequenceNumber,
    },

    /// This side (defender) disagreed with the attacker's report.
    #[error("calculation discrepancy: {0}")]
    CalculationDiscrepancy(Discrepancy),

    /// The peer (defender) disagreed with this side's report.
    #[error("peer requested resolution: {0}")]
    ResolutionRequested(Discrepancy),

    /// The socket reader stopped.
    #[error("link to the peer closed")]
    LinkClosed,

    /// The peer never answered the setup exchange.
    #[error("no battle setup from the peer after {attempts} attempts")]
    SetupTimeout {
        /// Setup sends made.
        attempts: u32,
    },

    /// Invalid configuration file or flag.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Combat-rule error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Wire or socket error.
    #[error(transparent)]
    Net(#[from] NetError),
}

/// Result type for battle operations.
pub type BattleResult<T> = Result<T, BattleError>;

impl BattleError {
    /// Whether the error came from the two sides disagreeing on a turn.
    #[must_use]
    pub const fn is_discrepancy(&self) -> bool {
        matches!(self, Self::CalculationDiscrepancy(_) | Self::ResolutionRequested(_))
    }
}
