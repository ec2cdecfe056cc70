use crate::types::Entity;
use serde::{Deserialize, Serialize};

/// Moves that restore HP reliably
pub const RECOVERY_MOVES: [&str; 13] = [
    "recover",
    "milk-drink",
    "soft-boiled",
    "slack-off",
    "heal-order",
    "roost",
    "wish",
    "synthesis",
    "moonlight",
    "morning-sun",
    "shore-up",
    "lunar-blessing",
    "strength-sap",
];

pub const HAZARD_MOVES: [&str; 5] = [
    "spikes",
    "ceaseless-edge",
    "stealth-rock",
    "toxic-spikes",
    "sticky-web",
];

pub const HAZARD_ABILITIES: [&str; 1] = ["toxic-debris"];

pub const HAZARD_REMOVAL_MOVES: [&str; 5] = [
    "rapid-spin",
    "mortal-spin",
    "defog",
    "tidy-up",
    "court-change",
];

/// Passive recovery item (Leftovers) heals 1/16 per turn
const RECOVERY_ITEM_FACTOR: f64 = 17.0 / 16.0;
/// Adjusted bulk above this lasts long enough to use a recovery move
const RECOVERY_DOUBLING_THRESHOLD: f64 = 2.0;

const PHYSICAL_TIERS: [(f64, Badge); 3] = [
    (11.5, Badge::Def5),
    (5.5, Badge::Def4),
    (2.5, Badge::Def3),
];

const SPECIAL_TIERS: [(f64, Badge); 3] = [
    (15.0, Badge::Spdef5),
    (7.0, Badge::Spdef4),
    (3.0, Badge::Spdef3),
];

/// Role badge shown on a species card
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Badge {
    #[serde(rename = "def3")]
    Def3,
    #[serde(rename = "def4")]
    Def4,
    #[serde(rename = "def5")]
    Def5,
    #[serde(rename = "spdef3")]
    Spdef3,
    #[serde(rename = "spdef4")]
    Spdef4,
    #[serde(rename = "spdef5")]
    Spdef5,
    #[serde(rename = "hazards")]
    Hazards,
    #[serde(rename = "spinner")]
    Spinner,
}

impl Badge {
    pub fn tag(&self) -> &'static str {
        match self {
            Badge::Def3 => "def3",
            Badge::Def4 => "def4",
            Badge::Def5 => "def5",
            Badge::Spdef3 => "spdef3",
            Badge::Spdef4 => "spdef4",
            Badge::Spdef5 => "spdef5",
            Badge::Hazards => "hazards",
            Badge::Spinner => "spinner",
        }
    }

    pub fn meaning(&self) -> &'static str {
        match self {
            Badge::Def3 => "Physically Bulky",
            Badge::Def4 => "Physical Wall",
            Badge::Def5 => "Physically Unkillable",
            Badge::Spdef3 => "Specially Bulky",
            Badge::Spdef4 => "Special Wall",
            Badge::Spdef5 => "Specially Unkillable",
            Badge::Hazards => "Can set hazards",
            Badge::Spinner => "Can remove hazards",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Badge::Def3 | Badge::Def4 | Badge::Def5 => "🛡️",
            Badge::Spdef3 | Badge::Spdef4 | Badge::Spdef5 => "🦺",
            Badge::Hazards => "⚠️",
            Badge::Spinner => "🌀",
        }
    }
}

fn has_any(list: &[String], vocabulary: &[&str]) -> bool {
    list.iter().any(|item| vocabulary.contains(&item.as_str()))
}

fn tier(bulk: f64, tiers: &[(f64, Badge)]) -> Option<Badge> {
    tiers
        .iter()
        .find(|(threshold, _)| bulk > *threshold)
        .map(|&(_, badge)| badge)
}

/// Bulk after accounting for recovery. Each channel is adjusted on its own.
pub fn recovery_adjusted(bulk: f64) -> f64 {
    let with_item = bulk * RECOVERY_ITEM_FACTOR;
    if with_item > RECOVERY_DOUBLING_THRESHOLD {
        with_item * 2.0
    } else {
        with_item
    }
}

/// Badges in display order: physical tier, special tier, hazards, spinner
pub fn classify(physical_bulk: f64, special_bulk: f64, moves: &[String], abilities: &[String]) -> Vec<Badge> {
    let (physical_bulk, special_bulk) = if has_any(moves, &RECOVERY_MOVES) {
        (recovery_adjusted(physical_bulk), recovery_adjusted(special_bulk))
    } else {
        (physical_bulk, special_bulk)
    };

    let mut badges = Vec::new();
    badges.extend(tier(physical_bulk, &PHYSICAL_TIERS));
    badges.extend(tier(special_bulk, &SPECIAL_TIERS));

    if has_any(moves, &HAZARD_MOVES) || has_any(abilities, &HAZARD_ABILITIES) {
        badges.push(Badge::Hazards);
    }
    if has_any(moves, &HAZARD_REMOVAL_MOVES) {
        badges.push(Badge::Spinner);
    }

    badges
}

pub fn classify_entity(entity: &Entity) -> Vec<Badge> {
    classify(
        entity.stats.physical_bulk(),
        entity.stats.special_bulk(),
        &entity.moves,
        &entity.abilities,
    )
}
