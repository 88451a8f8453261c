//! # Battle Session
//!
//! Everything between a completed handshake and `GAME_OVER`.
//!
//! ## Architecture
//!
//! - **Setup**: combatant and boost announcement, with resends
//! - **Session**: turn order, HP, the shared random source and the event log
//! - **Coordinator**: the per-turn attacker/defender exchange and dual
//!   damage computation
//! - **Resolution**: what to do when the two computations disagree
//!
//! The coordinator blocks on one crossbeam `select!` at a time; nothing in
//! this module spawns threads beyond the link's reader and sweeper.

mod coordinator;
mod dispatch;
mod link;
mod notice;
mod resolution;
mod session;
mod setup;

pub use coordinator::{TurnCoordinator, SETUP_ATTEMPTS, SETUP_RESEND};
pub use link::BattleLink;
pub use notice::BattleNotice;
pub use resolution::{AttackerWinsPolicy, Discrepancy, FlagOnlyPolicy, Resolution, ResolutionPolicy};
pub use session::{BattleEvent, BattleOutcome, BattleSession, Lifecycle, Participant, Side, TurnRecord};
pub use setup::{resolve_setup, LocalSetup, PeerSetupReceipt, SetupExchange, DUPLICATE_SETUP_REPLIES};
