//! # Element Types
//!
//! The eighteen elemental tags and the pairwise effectiveness chart.
//!
//! Pairs not listed in the chart are neutral (1.0). A defender with two tags
//! takes the product of both multipliers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Elemental type tag carried by combatants and moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum ElementType {
    Normal,
    Fire,
    Water,
    Electric,
    Grass,
    Ice,
    Fighting,
    Poison,
    Ground,
    Flying,
    Psychic,
    Bug,
    Rock,
    Ghost,
    Dragon,
    Dark,
    Steel,
    Fairy,
}

impl ElementType {
    /// Every element, in chart order.
    pub const ALL: [Self; 18] = [
        Self::Normal,
        Self::Fire,
        Self::Water,
        Self::Electric,
        Self::Grass,
        Self::Ice,
        Self::Fighting,
        Self::Poison,
        Self::Ground,
        Self::Flying,
        Self::Psychic,
        Self::Bug,
        Self::Rock,
        Self::Ghost,
        Self::Dragon,
        Self::Dark,
        Self::Steel,
        Self::Fairy,
    ];

    /// Lowercase tag as it appears in rosters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Fire => "fire",
            Self::Water => "water",
            Self::Electric => "electric",
            Self::Grass => "grass",
            Self::Ice => "ice",
            Self::Fighting => "fighting",
            Self::Poison => "poison",
            Self::Ground => "ground",
            Self::Flying => "flying",
            Self::Psychic => "psychic",
            Self::Bug => "bug",
            Self::Rock => "rock",
            Self::Ghost => "ghost",
            Self::Dragon => "dragon",
            Self::Dark => "dark",
            Self::Steel => "steel",
            Self::Fairy => "fairy",
        }
    }

    /// Capitalized name, used for generated move names.
    #[must_use]
    pub fn title(self) -> String {
        let tag = self.as_str();
        let mut chars = tag.chars();
        chars.next().map_or_else(String::new, |first| {
            first.to_ascii_uppercase().to_string() + chars.as_str()
        })
    }

    /// Whether moves of this element default to the special category.
    #[must_use]
    pub const fn leans_special(self) -> bool {
        matches!(
            self,
            Self::Fire
                | Self::Water
                | Self::Grass
                | Self::Electric
                | Self::Ice
                | Self::Psychic
                | Self::Dragon
                | Self::Dark
                | Self::Fairy
        )
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        Self::ALL
            .into_iter()
            .find(|element| element.as_str().eq_ignore_ascii_case(tag))
            .ok_or_else(|| CoreError::UnknownElement(tag.to_string()))
    }
}

/// Multiplier for an attack of element `attack` against a single defending tag.
#[must_use]
pub const fn effectiveness(attack: ElementType, defend: ElementType) -> f64 {
    use ElementType::{
        Bug, Dark, Dragon, Electric, Fairy, Fighting, Fire, Flying, Ghost, Grass, Ground, Ice,
        Normal, Poison, Psychic, Rock, Steel, Water,
    };

    match (attack, defend) {
        (Normal, Rock | Steel) => 0.5,
        (Normal, Ghost) => 0.0,

        (Fire, Fire | Water | Rock | Dragon) => 0.5,
        (Fire, Grass | Ice | Bug | Steel) => 2.0,

        (Water, Fire | Ground | Rock) => 2.0,
        (Water, Water | Grass | Dragon) => 0.5,

        (Electric, Water | Flying) => 2.0,
        (Electric, Electric | Grass | Dragon) => 0.5,
        (Electric, Ground) => 0.0,

        (Grass, Water | Ground | Rock) => 2.0,
        (Grass, Fire | Grass | Poison | Flying | Bug | Dragon | Steel) => 0.5,

        (Ice, Grass | Ground | Flying | Dragon) => 2.0,
        (Ice, Fire | Water | Ice | Steel) => 0.5,

        (Fighting, Normal | Ice | Rock | Dark | Steel) => 2.0,
        (Fighting, Poison | Flying | Psychic | Bug | Fairy) => 0.5,
        (Fighting, Ghost) => 0.0,

        (Poison, Grass | Fairy) => 2.0,
        (Poison, Poison | Ground | Rock | Ghost) => 0.5,
        (Poison, Steel) => 0.0,

        (Ground, Fire | Electric | Poison | Rock | Steel) => 2.0,
        (Ground, Grass | Bug) => 0.5,
        (Ground, Flying) => 0.0,

        (Flying, Grass | Fighting | Bug) => 2.0,
        (Flying, Electric | Rock | Steel) => 0.5,

        (Psychic, Fighting | Poison) => 2.0,
        (Psychic, Psychic | Steel) => 0.5,
        (Psychic, Dark) => 0.0,

        (Bug, Grass | Psychic | Dark) => 2.0,
        (Bug, Fire | Fighting | Poison | Flying | Ghost | Steel | Fairy) => 0.5,

        (Rock, Fire | Ice | Flying | Bug) => 2.0,
        (Rock, Fighting | Ground | Steel) => 0.5,

        (Ghost, Psychic | Ghost) => 2.0,
        (Ghost, Dark) => 0.5,
        (Ghost, Normal) => 0.0,

        (Dragon, Dragon) => 2.0,
        (Dragon, Steel) => 0.5,
        (Dragon, Fairy) => 0.0,

        (Dark, Psychic | Ghost) => 2.0,
        (Dark, Fighting | Dark | Fairy) => 0.5,

        (Steel, Ice | Rock | Fairy) => 2.0,
        (Steel, Fire | Water | Electric | Steel) => 0.5,

        (Fairy, Fighting | Dragon | Dark) => 2.0,
        (Fairy, Fire | Poison | Steel) => 0.5,

        _ => 1.0,
    }
}

/// Combined multiplier against a defender with one or two tags.
#[must_use]
pub fn dual_effectiveness(attack: ElementType, primary: ElementType, secondary: Option<ElementType>) -> f64 {
    let second = secondary.map_or(1.0, |tag| effectiveness(attack, tag));
    effectiveness(attack, primary) * second
}
