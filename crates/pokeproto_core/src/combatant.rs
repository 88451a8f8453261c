//! # Combatants
//!
//! A combatant's battle state: hit points, four base stats, one or two
//! element tags, a move list, and the special-boost allocation for the match.
//!
//! HP is clamped to `0..=max_hp` by every mutator.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::ElementType;

/// Which stat pair a move uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageCategory {
    /// Attack against defense.
    Physical,
    /// Special attack against special defense.
    Special,
}

/// A move a combatant can use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Move {
    /// Display and wire name.
    pub name: String,
    /// Base power. Zero is treated as 1.0 by the damage formula.
    pub base_power: f64,
    /// Element of the move.
    pub element: ElementType,
    /// Stat pair used.
    pub category: DamageCategory,
}

impl Move {
    /// Creates a move.
    #[must_use]
    pub fn new(name: impl Into<String>, base_power: f64, element: ElementType, category: DamageCategory) -> Self {
        Self {
            name: name.into(),
            base_power,
            element,
            category,
        }
    }

    /// Returns true for special-category moves.
    #[inline]
    #[must_use]
    pub fn is_special(&self) -> bool {
        self.category == DamageCategory::Special
    }
}

/// The four base stats used by the damage formula.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseStats {
    /// Physical attack.
    pub attack: u32,
    /// Physical defense.
    pub defense: u32,
    /// Special attack.
    pub special_attack: u32,
    /// Special defense.
    pub special_defense: u32,
}

/// Per-match split of special-boost uses.
///
/// The two counts together may not exceed [`BoostAllocation::BUDGET`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct BoostAllocation {
    special_attack_uses: u8,
    special_defense_uses: u8,
}

impl BoostAllocation {
    /// Maximum combined boost uses per match.
    pub const BUDGET: u8 = 10;

    /// Validates and creates an allocation.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidBoostAllocation`] when the sum exceeds the budget.
    pub fn new(special_attack_uses: u8, special_defense_uses: u8) -> CoreResult<Self> {
        let total = u16::from(special_attack_uses) + u16::from(special_defense_uses);
        if total > u16::from(Self::BUDGET) {
            return Err(CoreError::InvalidBoostAllocation {
                attack: special_attack_uses,
                defense: special_defense_uses,
                budget: Self::BUDGET,
            });
        }
        Ok(Self {
            special_attack_uses,
            special_defense_uses,
        })
    }

    /// Remaining special-attack boosts.
    #[must_use]
    pub const fn special_attack_uses(&self) -> u8 {
        self.special_attack_uses
    }

    /// Remaining special-defense boosts.
    #[must_use]
    pub const fn special_defense_uses(&self) -> u8 {
        self.special_defense_uses
    }

    /// Consumes one special-attack boost. Returns false when none are left.
    pub fn spend_attack(&mut self) -> bool {
        if self.special_attack_uses == 0 {
            return false;
        }
        self.special_attack_uses -= 1;
        true
    }

    /// Consumes one special-defense boost. Returns false when none are left.
    pub fn spend_defense(&mut self) -> bool {
        if self.special_defense_uses == 0 {
            return false;
        }
        self.special_defense_uses -= 1;
        true
    }
}

/// A combatant's live battle state.
#[derive(Clone, Debug, PartialEq)]
pub struct CombatantState {
    name: String,
    current_hp: u32,
    max_hp: u32,
    stats: BaseStats,
    primary: ElementType,
    secondary: Option<ElementType>,
    moves: Vec<Move>,
    boosts: BoostAllocation,
}

impl CombatantState {
    /// Creates a combatant at full health with no boosts allocated.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        max_hp: u32,
        stats: BaseStats,
        primary: ElementType,
        secondary: Option<ElementType>,
        moves: Vec<Move>,
    ) -> Self {
        Self {
            name: name.into(),
            current_hp: max_hp,
            max_hp,
            stats,
            primary,
            secondary,
            moves,
            boosts: BoostAllocation::default(),
        }
    }

    /// Replaces the boost allocation.
    #[must_use]
    pub fn with_boosts(mut self, boosts: BoostAllocation) -> Self {
        self.boosts = boosts;
        self
    }

    /// Combatant name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current hit points.
    #[must_use]
    pub const fn current_hp(&self) -> u32 {
        self.current_hp
    }

    /// Maximum hit points.
    #[must_use]
    pub const fn max_hp(&self) -> u32 {
        self.max_hp
    }

    /// Base stats.
    #[must_use]
    pub const fn stats(&self) -> &BaseStats {
        &self.stats
    }

    /// Primary element.
    #[must_use]
    pub const fn primary(&self) -> ElementType {
        self.primary
    }

    /// Secondary element, if any.
    #[must_use]
    pub const fn secondary(&self) -> Option<ElementType> {
        self.secondary
    }

    /// Known moves, in slot order.
    #[must_use]
    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    /// Boost allocation.
    #[must_use]
    pub const fn boosts(&self) -> &BoostAllocation {
        &self.boosts
    }

    /// Mutable boost allocation.
    pub fn boosts_mut(&mut self) -> &mut BoostAllocation {
        &mut self.boosts
    }

    /// Looks up a move by slot.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MoveSlotOutOfRange`] for an invalid slot.
    pub fn move_at(&self, index: usize) -> CoreResult<&Move> {
        self.moves.get(index).ok_or(CoreError::MoveSlotOutOfRange {
            index,
            available: self.moves.len(),
        })
    }

    /// Looks up a move by name, exact first, then ignoring ASCII case.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownMove`] when no move matches.
    pub fn find_move(&self, name: &str) -> CoreResult<&Move> {
        self.moves
            .iter()
            .find(|m| m.name == name)
            .or_else(|| self.moves.iter().find(|m| m.name.eq_ignore_ascii_case(name)))
            .ok_or_else(|| CoreError::UnknownMove {
                combatant: self.name.clone(),
                name: name.to_string(),
            })
    }

    /// Subtracts damage, saturating at zero. Returns the remaining HP.
    pub fn apply_damage(&mut self, damage: u32) -> u32 {
        self.current_hp = self.current_hp.saturating_sub(damage);
        self.current_hp
    }

    /// Sets HP directly, clamped to `0..=max_hp`.
    pub fn set_hp(&mut self, hp: u32) {
        self.current_hp = hp.min(self.max_hp);
    }

    /// Returns true once HP reaches zero.
    #[inline]
    #[must_use]
    pub const fn is_fainted(&self) -> bool {
        self.current_hp == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> CombatantState {
        CombatantState::new(
            "Sample",
            50,
            BaseStats {
                attack: 10,
                defense: 10,
                special_attack: 10,
                special_defense: 10,
            },
            ElementType::Normal,
            None,
            vec![Move::new("Tackle", 40.0, ElementType::Normal, DamageCategory::Physical)],
        )
    }

    #[test]
    fn test_boost_budget() {
        assert!(BoostAllocation::new(5, 5).is_ok());
        assert!(BoostAllocation::new(10, 0).is_ok());
        assert_eq!(
            BoostAllocation::new(6, 5),
            Err(CoreError::InvalidBoostAllocation {
                attack: 6,
                defense: 5,
                budget: 10
            })
        );
    }

    #[test]
    fn test_boost_spending_stops_at_zero() {
        let mut boosts = BoostAllocation::new(1, 0).unwrap();
        assert!(boosts.spend_attack());
        assert!(!boosts.spend_attack());
        assert!(!boosts.spend_defense());
        assert_eq!(boosts.special_attack_uses(), 0);
    }

    #[test]
    fn test_hp_clamps() {
        let mut mon = sample();
        assert_eq!(mon.apply_damage(30), 20);
        assert_eq!(mon.apply_damage(500), 0);
        assert!(mon.is_fainted());

        mon.set_hp(999);
        assert_eq!(mon.current_hp(), 50);
    }

    #[test]
    fn test_move_lookup() {
        let mon = sample();
        assert_eq!(mon.find_move("tackle").unwrap().name, "Tackle");
        assert!(mon.find_move("Hyper Beam").is_err());
        assert!(mon.move_at(3).is_err());
    }

    proptest! {
        #[test]
        fn test_hp_stays_in_range(hits in prop::collection::vec(0u32..200, 0..12), reset in any::<u32>()) {
            let mut mon = sample();
            let mut expected = 50u32;
            for hit in hits {
                expected = expected.saturating_sub(hit);
                prop_assert_eq!(mon.apply_damage(hit), expected);
                prop_assert_eq!(mon.is_fainted(), expected == 0);
            }
            mon.set_hp(reset);
            prop_assert_eq!(mon.current_hp(), reset.min(50));
        }
    }
}
