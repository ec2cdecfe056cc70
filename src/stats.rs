use crate::types::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Reference physical attacker: attack stat 359 with a 100 power move
pub const PHYSICAL_ATTACKER_POWER: f64 = 100.0 * 359.0;
/// Reference special attacker: special attack stat 369 with an 80 power move
pub const SPECIAL_ATTACKER_POWER: f64 = 80.0 * 369.0;

/// Derived profile of one set of base stats. Recomputed on every read.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedStats {
    pub total: i32,
    pub physical_bulk: f64,
    pub special_bulk: f64,
}

/// Number of reference hits a defender with `hp` and `defense_stat` survives.
///
/// Level 100 stats with max investment, a 1.1 nature on the defense stat, and
/// a 1.5 STAB reference attack.
pub fn bulk(hp: i32, defense_stat: i32, attacker_power: f64) -> f64 {
    let effective_hp = (2 * hp + 204) as f64;
    let effective_defense = ((2 * defense_stat + 99) as f64 * 1.1).floor();
    let reference_damage = ((42.0 * attacker_power / effective_defense) / 50.0 + 2.0) * 1.5;
    effective_hp / reference_damage
}

impl BaseStats {
    pub fn physical_bulk(&self) -> f64 {
        bulk(self.hp, self.defense, PHYSICAL_ATTACKER_POWER)
    }

    pub fn special_bulk(&self) -> f64 {
        bulk(self.hp, self.special_defense, SPECIAL_ATTACKER_POWER)
    }

    pub fn derived(&self) -> DerivedStats {
        DerivedStats {
            total: self.total(),
            physical_bulk: self.physical_bulk(),
            special_bulk: self.special_bulk(),
        }
    }

    /// Value of one tracked dimension
    pub fn value(&self, dimension: StatDimension) -> f64 {
        match dimension {
            StatDimension::Hp => self.hp as f64,
            StatDimension::Attack => self.attack as f64,
            StatDimension::Defense => self.defense as f64,
            StatDimension::SpecialAttack => self.special_attack as f64,
            StatDimension::SpecialDefense => self.special_defense as f64,
            StatDimension::Speed => self.speed as f64,
            StatDimension::PhysicalBulk => self.physical_bulk(),
            StatDimension::SpecialBulk => self.special_bulk(),
            StatDimension::Total => self.total() as f64,
        }
    }
}

/// Every pool member's value per dimension, sorted descending.
///
/// A pure view over one pool: rebuild it whenever the pool or its form
/// filter changes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolStatistics {
    columns: BTreeMap<StatDimension, Vec<f64>>,
}

impl PoolStatistics {
    /// Snapshot over `entities` for the given dimensions. Equal values keep
    /// pool order.
    pub fn build<'a, I>(entities: I, dimensions: &[StatDimension]) -> Self
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        let mut columns: BTreeMap<StatDimension, Vec<f64>> =
            dimensions.iter().map(|&d| (d, Vec::new())).collect();

        for entity in entities {
            for (dimension, values) in columns.iter_mut() {
                values.push(entity.stats.value(*dimension));
            }
        }

        for values in columns.values_mut() {
            values.sort_by(|a, b| b.total_cmp(a));
        }

        Self { columns }
    }

    /// Snapshot over all tracked dimensions
    pub fn from_entities<'a, I>(entities: I) -> Self
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        Self::build(entities, &StatDimension::ALL)
    }

    /// Flatten every species' forms, keep the ones `filter` allows, and snapshot
    pub fn from_species(species: &[Species], filter: FormFilter) -> Self {
        Self::from_entities(
            species
                .iter()
                .flat_map(|s| s.forms.iter())
                .filter(|form| filter.allows(form)),
        )
    }

    /// Sorted values for a dimension; empty when untracked or the pool is empty
    pub fn values(&self, dimension: StatDimension) -> &[f64] {
        self.columns.get(&dimension).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn max(&self, dimension: StatDimension) -> Option<f64> {
        self.values(dimension).first().copied()
    }

    pub fn min(&self, dimension: StatDimension) -> Option<f64> {
        self.values(dimension).last().copied()
    }

    pub fn len(&self) -> usize {
        self.columns.values().next().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Comparator over entities for a sort key.
///
/// Stat keys order highest first. `Name` orders lexicographically ascending
/// by byte value, which is the only place ascending order is used.
pub fn compare_by(key: SortKey) -> impl Fn(&Entity, &Entity) -> Ordering {
    move |a, b| match key {
        SortKey::Name => a.name.cmp(&b.name),
        SortKey::Stat(dimension) => b
            .stats
            .value(dimension)
            .total_cmp(&a.stats.value(dimension)),
    }
}

/// One spoke of the stat radar
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RadarAxis {
    pub dimension: StatDimension,
    pub raw: f64,
    /// `raw` as a percentage of the pool maximum, or `raw` without pool data
    pub scaled: f64,
}

pub const RADAR_DIMENSIONS: [StatDimension; 5] = [
    StatDimension::Speed,
    StatDimension::Attack,
    StatDimension::PhysicalBulk,
    StatDimension::SpecialBulk,
    StatDimension::SpecialAttack,
];

pub fn radar_profile(stats: &BaseStats, pool: Option<&PoolStatistics>) -> Vec<RadarAxis> {
    RADAR_DIMENSIONS
        .iter()
        .map(|&dimension| {
            let raw = stats.value(dimension);
            let scaled = match pool.and_then(|p| p.max(dimension)) {
                Some(max) if max != 0.0 => raw / max * 100.0,
                _ => raw,
            };
            RadarAxis { dimension, raw, scaled }
        })
        .collect()
}
