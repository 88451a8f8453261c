//! # PokeProto
//!
//! Peer-to-peer turn-based battles over UDP. Two peers pair through
//! broadcast discovery and a handshake, exchange combatants, and then take
//! turns attacking. Both sides compute every hit independently from a
//! shared seed and compare results before the turn counts. Spectators watch
//! through the host.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  bin/host, bin/joiner, bin/spectator                      │
//! ├───────────────────────────────────────────────────────────┤
//! │  lobby: discovery + handshake, then hand-off               │
//! ├──────────────────────────────┬────────────────────────────┤
//! │  battle: setup, coordinator, │  spectator: mirrored view  │
//! │  session, resolution         │                            │
//! ├──────────────────────────────┴────────────────────────────┤
//! │  pokeproto_networking: codec, ARQ, discovery, relay       │
//! ├───────────────────────────────────────────────────────────┤
//! │  pokeproto_core: roster, type chart, damage, seeded rng    │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use pokeproto::{host_match, bind_host, spawn_stdin_reader, LocalSetup, MatchOptions, PeerConfig};
//!
//! let config = PeerConfig::default();
//! let local = LocalSetup::new("Red", "Charizard", config.boosts()?);
//! let outcome = host_match(bind_host(&config)?, &config, local, MatchOptions::new(spawn_stdin_reader()))?;
//! println!("{} won", outcome.winner);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod battle;
pub mod chat;
pub mod config;
pub mod error;
pub mod input;
pub mod lobby;
pub mod logging;
pub mod spectator;

pub use battle::{
    AttackerWinsPolicy, BattleEvent, BattleLink, BattleNotice, BattleOutcome, BattleSession, Discrepancy,
    FlagOnlyPolicy, Lifecycle, LocalSetup, Resolution, ResolutionPolicy, Side, TurnCoordinator,
};
pub use chat::{ChatDeduper, ChatLine, StickerTable};
pub use config::{Overrides, PeerConfig};
pub use error::{BattleError, BattleResult};
pub use input::{parse_command, spawn_line_reader, spawn_stdin_reader, PlayerCommand};
pub use lobby::{bind_client, bind_host, host_match, join_match, spectate, MatchOptions};
pub use logging::init_tracing;
pub use spectator::{CombatantSnapshot, SpectatorEvent, SpectatorSession, SpectatorView};
