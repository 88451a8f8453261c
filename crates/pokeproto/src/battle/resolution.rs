//! # Discrepancy Resolution
//!
//! Both peers compute every hit. When the defender's numbers differ from the
//! attacker's report it answers with `RESOLUTION_REQUEST` instead of a
//! confirm, and each side asks its [`ResolutionPolicy`] what to do next.
//!
//! ## Design
//!
//! No tie-break rule is built in. [`FlagOnlyPolicy`] aborts on both sides so
//! the divergence surfaces as a distinct error; other policies can adopt
//! either side's numbers and keep playing.

use std::fmt;

/// Both computations of one disputed turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Discrepancy {
    /// Turn number (1-based).
    pub turn: u32,
    /// Attacking combatant.
    pub attacker: String,
    /// Move used.
    pub move_used: String,
    /// Damage in the attacker's report.
    pub attacker_damage: u32,
    /// Defender HP in the attacker's report.
    pub attacker_defender_hp: u32,
    /// Damage the defender computed.
    pub defender_damage: u32,
    /// Defender HP the defender computed.
    pub defender_hp: u32,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "turn {}: {} used {}, attacker says {} damage ({} HP left), defender says {} damage ({} HP left)",
            self.turn,
            self.attacker,
            self.move_used,
            self.attacker_damage,
            self.attacker_defender_hp,
            self.defender_damage,
            self.defender_hp,
        )
    }
}

/// What a side does about a disputed turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// End the session with an error.
    Abort,
    /// Adopt the numbers the peer sent.
    AcceptReported,
    /// Keep this side's own numbers.
    AcceptLocal,
}

/// Extension point for settling a discrepancy.
pub trait ResolutionPolicy: Send {
    /// Called on the defender after it sent `RESOLUTION_REQUEST`.
    fn on_local_discrepancy(&mut self, discrepancy: &Discrepancy) -> Resolution;

    /// Called on the attacker when a `RESOLUTION_REQUEST` arrives.
    fn on_resolution_request(&mut self, discrepancy: &Discrepancy) -> Resolution;
}

/// Flags the discrepancy and stops.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlagOnlyPolicy;

impl ResolutionPolicy for FlagOnlyPolicy {
    fn on_local_discrepancy(&mut self, discrepancy: &Discrepancy) -> Resolution {
        tracing::warn!(%discrepancy, "calculation discrepancy");
        Resolution::Abort
    }

    fn on_resolution_request(&mut self, discrepancy: &Discrepancy) -> Resolution {
        tracing::warn!(%discrepancy, "peer requested resolution");
        Resolution::Abort
    }
}

/// The attacker's report always wins.
///
/// Keeps a match going through a desync at the cost of trusting the
/// attacker.
#[derive(Clone, Copy, Debug, Default)]
pub struct AttackerWinsPolicy;

impl ResolutionPolicy for AttackerWinsPolicy {
    fn on_local_discrepancy(&mut self, _discrepancy: &Discrepancy) -> Resolution {
        Resolution::AcceptReported
    }

    fn on_resolution_request(&mut self, _discrepancy: &Discrepancy) -> Resolution {
        Resolution::AcceptLocal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Discrepancy {
        Discrepancy {
            turn: 3,
            attacker: "Charizard".into(),
            move_used: "Fire Attack".into(),
            attacker_damage: 40,
            attacker_defender_hp: 5,
            defender_damage: 38,
            defender_hp: 7,
        }
    }

    #[test]
    fn test_flag_only_aborts_both_sides() {
        let mut policy = FlagOnlyPolicy;
        assert_eq!(policy.on_local_discrepancy(&sample()), Resolution::Abort);
        assert_eq!(policy.on_resolution_request(&sample()), Resolution::Abort);
    }

    #[test]
    fn test_attacker_wins_is_consistent() {
        // Both sides end up with the attacker's numbers
        let mut policy = AttackerWinsPolicy;
        assert_eq!(policy.on_local_discrepancy(&sample()), Resolution::AcceptReported);
        assert_eq!(policy.on_resolution_request(&sample()), Resolution::AcceptLocal);
    }

    #[test]
    fn test_display_names_both_sides() {
        let text = sample().to_string();
        assert!(text.contains("attacker says 40"));
        assert!(text.contains("defender says 38"));
    }
}
