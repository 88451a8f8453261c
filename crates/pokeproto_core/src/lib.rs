//! # PokeProto Core
//!
//! Combat math shared by every peer in a PokeProto match.
//!
//! ## Design Principles
//!
//! 1. **Pure functions** - Damage is a function of the combatants, the move,
//!    the boost flags, and one draw from the session random source
//! 2. **Lockstep randomness** - Both peers seed the same [`BattleRng`] and draw
//!    exactly once per computation
//! 3. **No I/O** - Networking lives in `pokeproto_networking`
//!
//! ## Example
//!
//! ```rust
//! use pokeproto_core::{calculate_damage, BattleRng, DamageInput, Roster};
//!
//! let roster = Roster::builtin();
//! let attacker = roster.lookup("Charizard").unwrap();
//! let defender = roster.lookup("Blastoise").unwrap();
//! let mut rng = BattleRng::from_seed(42);
//!
//! let outcome = calculate_damage(&DamageInput {
//!     attacker: &attacker,
//!     defender: &defender,
//!     used_move: attacker.move_at(0).unwrap(),
//!     attack_boost: false,
//!     defense_boost: false,
//!     draw: rng.next_draw(),
//! });
//! assert!(outcome.damage > 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod combatant;
pub mod damage;
pub mod error;
pub mod rng;
pub mod roster;
pub mod types;

pub use combatant::{BaseStats, BoostAllocation, CombatantState, DamageCategory, Move};
pub use damage::{calculate_damage, effectiveness_text, status_message, DamageInput, DamageOutcome};
pub use error::{CoreError, CoreResult};
pub use rng::BattleRng;
pub use roster::{default_moves, Roster, RosterEntry};
pub use types::{dual_effectiveness, effectiveness, ElementType};
