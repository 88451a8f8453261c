//! # Roster
//!
//! Species data both peers must agree on. A peer announces only its
//! combatant's name during setup; the other side rebuilds the full stat block
//! from its own roster, so both rosters must hold the same entries.
//!
//! Entries without an explicit move list get the generated default set:
//! Tackle, one 60-power attack per element tag, and a 70-power Special Blast.

use serde::{Deserialize, Serialize};

use crate::combatant::{BaseStats, CombatantState, DamageCategory, Move};
use crate::error::{CoreError, CoreResult};
use crate::types::ElementType;

/// One species definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Species name.
    pub name: String,
    /// Maximum hit points.
    pub hp: u32,
    /// Base stats.
    #[serde(flatten)]
    pub stats: BaseStats,
    /// Primary element.
    pub primary: ElementType,
    /// Secondary element.
    #[serde(default)]
    pub secondary: Option<ElementType>,
    /// Explicit move list. Generated when absent.
    #[serde(default)]
    pub moves: Option<Vec<Move>>,
}

impl RosterEntry {
    /// Builds a fresh combatant at full HP.
    #[must_use]
    pub fn instantiate(&self) -> CombatantState {
        let moves = self
            .moves
            .clone()
            .unwrap_or_else(|| default_moves(self.primary, self.secondary));
        CombatantState::new(
            self.name.clone(),
            self.hp,
            self.stats,
            self.primary,
            self.secondary,
            moves,
        )
    }
}

/// Generated move set for a species with the given tags.
#[must_use]
pub fn default_moves(primary: ElementType, secondary: Option<ElementType>) -> Vec<Move> {
    let category_for = |element: ElementType| {
        if element.leans_special() {
            DamageCategory::Special
        } else {
            DamageCategory::Physical
        }
    };

    let mut moves = vec![Move::new(
        "Tackle",
        40.0,
        ElementType::Normal,
        DamageCategory::Physical,
    )];
    moves.push(Move::new(
        format!("{} Attack", primary.title()),
        60.0,
        primary,
        category_for(primary),
    ));
    if let Some(second) = secondary {
        moves.push(Move::new(
            format!("{} Attack", second.title()),
            60.0,
            second,
            category_for(second),
        ));
    }
    moves.push(Move::new(
        "Special Blast",
        70.0,
        primary,
        DamageCategory::Special,
    ));
    moves
}

/// Species lookup table.
#[derive(Clone, Debug, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    /// Creates an empty roster.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The built-in species set.
    #[must_use]
    pub fn builtin() -> Self {
        use ElementType::{Electric, Fighting, Fire, Flying, Ghost, Grass, Ground, Normal, Poison, Rock, Water};

        let species = |name: &str, hp, atk, def, spa, spd, primary, secondary| RosterEntry {
            name: name.to_string(),
            hp,
            stats: BaseStats {
                attack: atk,
                defense: def,
                special_attack: spa,
                special_defense: spd,
            },
            primary,
            secondary,
            moves: None,
        };

        Self {
            entries: vec![
                species("Bulbasaur", 45, 49, 49, 65, 65, Grass, Some(Poison)),
                species("Venusaur", 80, 82, 83, 100, 100, Grass, Some(Poison)),
                species("Charmander", 39, 52, 43, 60, 50, Fire, None),
                species("Charizard", 78, 84, 78, 109, 85, Fire, Some(Flying)),
                species("Squirtle", 44, 48, 65, 50, 64, Water, None),
                species("Blastoise", 79, 83, 100, 85, 105, Water, None),
                species("Pikachu", 35, 55, 40, 50, 50, Electric, None),
                species("Gengar", 60, 65, 60, 130, 75, Ghost, Some(Poison)),
                species("Machamp", 90, 130, 80, 65, 85, Fighting, None),
                species("Onix", 35, 45, 160, 30, 45, Rock, Some(Ground)),
                species("Snorlax", 160, 110, 65, 65, 110, Normal, None),
                species("Eevee", 55, 55, 50, 45, 65, Normal, None),
            ],
        }
    }

    /// Adds or replaces an entry (matched by exact name).
    pub fn insert(&mut self, entry: RosterEntry) {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(slot) => *slot = entry,
            None => self.entries.push(entry),
        }
    }

    /// Finds an entry by name, exact first, then ignoring ASCII case.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&RosterEntry> {
        let name = name.trim();
        self.entries
            .iter()
            .find(|e| e.name == name)
            .or_else(|| self.entries.iter().find(|e| e.name.eq_ignore_ascii_case(name)))
    }

    /// Instantiates a combatant by name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownCombatant`] when the name is not in the roster.
    pub fn lookup(&self, name: &str) -> CoreResult<CombatantState> {
        self.entry(name)
            .map(RosterEntry::instantiate)
            .ok_or_else(|| CoreError::UnknownCombatant(name.to_string()))
    }

    /// Species names, in roster order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true for an empty roster.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_moves_dual_type() {
        let moves = default_moves(ElementType::Grass, Some(ElementType::Poison));
        let names: Vec<_> = moves.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Tackle", "Grass Attack", "Poison Attack", "Special Blast"]);
        assert_eq!(moves[1].category, DamageCategory::Special);
        assert_eq!(moves[2].category, DamageCategory::Physical);
        assert_eq!(moves[3].element, ElementType::Grass);
    }

    #[test]
    fn test_default_moves_single_type() {
        let moves = default_moves(ElementType::Rock, None);
        assert_eq!(moves.len(), 3);
        assert_eq!(moves[1].name, "Rock Attack");
    }

    #[test]
    fn test_lookup_case_insensitive() {
        let roster = Roster::builtin();
        let mon = roster.lookup("charizard").unwrap();
        assert_eq!(mon.name(), "Charizard");
        assert_eq!(mon.current_hp(), 78);
        assert_eq!(mon.secondary(), Some(ElementType::Flying));
    }

    #[test]
    fn test_lookup_unknown() {
        let roster = Roster::builtin();
        assert_eq!(
            roster.lookup("Missingno"),
            Err(CoreError::UnknownCombatant("Missingno".to_string()))
        );
    }

    #[test]
    fn test_insert_replaces_same_name() {
        let mut roster = Roster::builtin();
        let before = roster.len();
        let mut entry = roster.entry("Pikachu").unwrap().clone();
        entry.hp = 999;
        roster.insert(entry);
        assert_eq!(roster.len(), before);
        assert_eq!(roster.lookup("Pikachu").unwrap().max_hp(), 999);
    }
}
