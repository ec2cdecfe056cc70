use crate::error::{SelectionError, StoreError};
use crate::percentile::pool_percentile;
use crate::storage::KeyValueStore;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// New `(winner, loser)` ratings after one comparison.
///
/// Each side moves toward the opponent's rating shifted by the performance
/// value, averaged over the matches played so far. The move is floored at
/// `min_change_pct` of the rating and at one point, so a long-played entity
/// still moves every time.
pub fn rate(
    winner_elo: f64,
    winner_matches: u32,
    loser_elo: f64,
    loser_matches: u32,
    config: &EngineConfig,
) -> (f64, f64) {
    let wm = winner_matches as f64;
    let lm = loser_matches as f64;

    let new_winner = ((winner_elo * wm + (loser_elo + config.performance_value)) / (wm + 1.0))
        .max(winner_elo * (1.0 + config.min_change_pct))
        .max(winner_elo + 1.0);

    // The percentage floor points the wrong way for negative ratings; the
    // one point floor still applies.
    let new_loser = ((loser_elo * lm + (winner_elo - config.performance_value)) / (lm + 1.0))
        .min(loser_elo * (1.0 - config.min_change_pct))
        .min(loser_elo - 1.0);

    (new_winner, new_loser)
}

/// A record with its 1-based position in the full ranking
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedRecord {
    pub rank: usize,
    #[serde(flatten)]
    pub record: RatingRecord,
}

/// Persistent faux-Elo ratings, one record per entity
pub struct RatingEngine {
    config: EngineConfig,
    records: Vec<RatingRecord>,
    store: Box<dyn KeyValueStore>,
    degraded: bool,
}

impl RatingEngine {
    /// Load ratings from `store`. An unreadable store starts the session
    /// empty and in memory only.
    pub fn new(config: EngineConfig, store: Box<dyn KeyValueStore>) -> Self {
        let mut engine = Self {
            config,
            records: Vec::new(),
            store,
            degraded: false,
        };

        match engine.load() {
            Ok(records) => engine.records = records,
            Err(StoreError::Json(e)) => {
                warn!("Discarding unreadable ratings under {:?}: {}", engine.config.storage_key, e);
            }
            Err(e) => {
                warn!("Ratings kept in memory only: {}", e);
                engine.degraded = true;
            }
        }

        engine
    }

    fn load(&self) -> Result<Vec<RatingRecord>, StoreError> {
        let Some(raw) = self.store.get(&self.config.storage_key)? else {
            return Ok(Vec::new());
        };
        let stored: Vec<RatingRecord> = serde_json::from_str(&raw)?;

        // One record per entity; the first one stored wins
        let mut seen = HashSet::new();
        Ok(stored.into_iter().filter(|r| seen.insert(r.number)).collect())
    }

    /// Write the full collection in one replacement
    fn persist(&mut self) {
        if self.degraded {
            return;
        }
        let result = serde_json::to_string(&self.records)
            .map_err(StoreError::from)
            .and_then(|json| self.store.set(&self.config.storage_key, &json));

        if let Err(e) = result {
            warn!("Saving ratings failed, continuing in memory: {}", e);
            self.degraded = true;
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// True once persistence failed and ratings only live in this session
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn records(&self) -> &[RatingRecord] {
        &self.records
    }

    pub fn get(&self, number: u32) -> Option<&RatingRecord> {
        self.records.iter().find(|r| r.number == number)
    }

    /// Current rating, or the starting rating for an unseen entity
    pub fn elo_or_default(&self, number: u32) -> f64 {
        self.get(number).map(|r| r.elo).unwrap_or(self.config.starting_elo)
    }

    pub fn matches_of(&self, number: u32) -> u32 {
        self.get(number).map(|r| r.matches).unwrap_or(0)
    }

    /// Ratings by entity number for bulk lookups
    pub fn elo_index(&self) -> HashMap<u32, f64> {
        self.records.iter().map(|r| (r.number, r.elo)).collect()
    }

    /// Entities compared at least once
    pub fn seen(&self) -> usize {
        self.records.len()
    }

    /// Comparisons played. Each counts once per side, so a de-duplicated
    /// store can leave a half match.
    pub fn total_matches(&self) -> f64 {
        self.records.iter().map(|r| r.matches as f64).sum::<f64>() / 2.0
    }

    pub fn most_matches(&self) -> u32 {
        self.records.iter().map(|r| r.matches).max().unwrap_or(0)
    }

    /// Apply one comparison and persist both records together
    pub fn record_comparison(
        &mut self,
        winner: &Entity,
        loser: &Entity,
    ) -> Result<MatchHistoryEntry, SelectionError> {
        if winner.number == loser.number {
            return Err(SelectionError::SelfComparison(winner.number));
        }

        let starting_elo = self.config.starting_elo;
        let mut updated = self.records.clone();

        let winner_index = position_or_insert(&mut updated, winner, starting_elo);
        let loser_index = position_or_insert(&mut updated, loser, starting_elo);

        let winner_elo = updated[winner_index].elo;
        let loser_elo = updated[loser_index].elo;
        let (new_winner, new_loser) = rate(
            winner_elo,
            updated[winner_index].matches,
            loser_elo,
            updated[loser_index].matches,
            &self.config,
        );

        updated[winner_index].elo = new_winner;
        updated[winner_index].matches += 1;
        updated[loser_index].elo = new_loser;
        updated[loser_index].matches += 1;

        debug!(
            "{} beat {}: {:.1} -> {:.1}, {:.1} -> {:.1}",
            winner.name, loser.name, winner_elo, new_winner, loser_elo, new_loser
        );

        self.records = updated;
        self.persist();

        Ok(MatchHistoryEntry {
            winner: RatingChange {
                number: winner.number,
                name: winner.name.clone(),
                before: winner_elo,
                after: new_winner,
            },
            loser: RatingChange {
                number: loser.number,
                name: loser.name.clone(),
                before: loser_elo,
                after: new_loser,
            },
        })
    }

    /// All records, highest rating first. Equal ratings keep insertion order.
    pub fn full_ranking(&self) -> Vec<RatingRecord> {
        let mut ranking = self.records.clone();
        ranking.sort_by(|a, b| b.elo.total_cmp(&a.elo));
        ranking
    }

    pub fn ranked(&self) -> Vec<RankedRecord> {
        self.full_ranking()
            .into_iter()
            .enumerate()
            .map(|(i, record)| RankedRecord { rank: i + 1, record })
            .collect()
    }

    pub fn top_n(&self, n: usize) -> Vec<RatingRecord> {
        let mut ranking = self.full_ranking();
        ranking.truncate(n);
        ranking
    }

    /// Lowest rated first
    pub fn bottom_n(&self, n: usize) -> Vec<RatingRecord> {
        let mut ranking = self.records.clone();
        ranking.sort_by(|a, b| a.elo.total_cmp(&b.elo));
        ranking.truncate(n);
        ranking
    }

    /// Position of an entity's rating among all ratings, 1.0 for the top
    pub fn percentile_position(&self, number: u32) -> Option<f64> {
        let elo = self.get(number)?.elo;
        let ratings: Vec<f64> = self.full_ranking().iter().map(|r| r.elo).collect();
        pool_percentile(elo, &ratings)
    }

    /// Drop every record. Calling it again changes nothing.
    pub fn reset(&mut self) {
        self.records.clear();
        self.persist();
    }

    pub fn winner_stays(&self) -> bool {
        if self.degraded {
            return false;
        }
        match self.store.get(&self.config.winner_stays_key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or(false),
            Ok(None) => false,
            Err(e) => {
                warn!("Reading winner-stays flag failed: {}", e);
                false
            }
        }
    }

    pub fn set_winner_stays(&mut self, enabled: bool) {
        if self.degraded {
            return;
        }
        let key = self.config.winner_stays_key.clone();
        if let Err(e) = self.store.set(&key, if enabled { "true" } else { "false" }) {
            warn!("Saving winner-stays flag failed: {}", e);
        }
    }
}

fn position_or_insert(records: &mut Vec<RatingRecord>, entity: &Entity, starting_elo: f64) -> usize {
    match records.iter().position(|r| r.number == entity.number) {
        Some(index) => index,
        None => {
            records.push(RatingRecord::fresh(entity, starting_elo));
            records.len() - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, UnavailableStore};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn entity(number: u32) -> Entity {
        Entity::new(number, &format!("mon-{}", number), BaseStats::new(50, 50, 50, 50, 50, 50))
    }

    fn engine() -> RatingEngine {
        RatingEngine::new(EngineConfig::default(), Box::new(MemoryStore::new()))
    }

    #[test]
    fn test_first_comparison_from_fresh_ratings() {
        let mut engine = engine();
        let entry = engine.record_comparison(&entity(1), &entity(2)).unwrap();

        assert_eq!(entry.winner.before, 1500.0);
        assert_eq!(entry.winner.after, 1900.0);
        assert_eq!(entry.loser.before, 1500.0);
        assert_eq!(entry.loser.after, 1100.0);
        assert_eq!(engine.get(1).unwrap().matches, 1);
        assert_eq!(engine.get(2).unwrap().matches, 1);
        assert_eq!(engine.seen(), 2);
        assert_eq!(engine.total_matches(), 1.0);
    }

    #[test]
    fn test_rating_floor_always_moves() {
        let config = EngineConfig::default();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..10_000 {
            let winner_elo = rng.gen_range(1.0..5000.0);
            let loser_elo = rng.gen_range(1.0..5000.0);
            let winner_matches = rng.gen_range(0..10_000);
            let loser_matches = rng.gen_range(0..10_000);

            let (new_winner, new_loser) =
                rate(winner_elo, winner_matches, loser_elo, loser_matches, &config);
            assert!(new_winner > winner_elo);
            assert!(new_winner >= winner_elo + 1.0);
            assert!(new_winner >= winner_elo * 1.004);
            assert!(new_loser < loser_elo);
            assert!(new_loser <= loser_elo - 1.0);
        }
    }

    #[test]
    fn test_floor_dominates_for_experienced_winner() {
        let config = EngineConfig::default();
        // Beating a much weaker opponent after many matches barely changes the average
        let (new_winner, new_loser) = rate(2000.0, 500, 1000.0, 500, &config);
        assert_eq!(new_winner, 2000.0 * 1.004);
        assert_eq!(new_loser, 1000.0 * 0.996);
    }

    #[test]
    fn test_negative_ratings_keep_one_point_floor() {
        let config = EngineConfig::default();
        let (new_winner, new_loser) = rate(-100.0, 3, -100.0, 3, &config);
        assert!(new_winner >= -99.0);
        assert!(new_loser <= -101.0);
    }

    #[test]
    fn test_rankings() {
        let mut engine = engine();
        // 1 beats everyone, 4 loses to everyone
        for (w, l) in [(1, 2), (1, 3), (1, 4), (2, 3), (2, 4), (3, 4)] {
            engine.record_comparison(&entity(w), &entity(l)).unwrap();
        }

        let order: Vec<u32> = engine.full_ranking().iter().map(|r| r.number).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);

        let top: Vec<u32> = engine.top_n(2).iter().map(|r| r.number).collect();
        assert_eq!(top, vec![1, 2]);

        let bottom: Vec<u32> = engine.bottom_n(2).iter().map(|r| r.number).collect();
        assert_eq!(bottom, vec![4, 3]);

        assert_eq!(engine.top_n(10).len(), 4);
        assert_eq!(engine.ranked()[0].rank, 1);
        assert_eq!(engine.percentile_position(1), Some(1.0));
        assert_eq!(engine.percentile_position(4), Some(0.25));
        assert_eq!(engine.percentile_position(99), None);
        assert_eq!(engine.most_matches(), 3);
        assert_eq!(engine.total_matches(), 6.0);
    }

    #[test]
    fn test_ratings_persist_across_sessions() {
        let mut store = MemoryStore::new();
        {
            let mut engine = RatingEngine::new(EngineConfig::default(), Box::new(store.clone()));
            engine.record_comparison(&entity(1), &entity(2)).unwrap();
            let json = serde_json::to_string(engine.records()).unwrap();
            store.set("comparison", &json).unwrap();
        }

        let engine = RatingEngine::new(EngineConfig::default(), Box::new(store));
        assert_eq!(engine.get(1).unwrap().elo, 1900.0);
        assert_eq!(engine.get(2).unwrap().elo, 1100.0);
        assert!(!engine.is_degraded());
    }

    #[test]
    fn test_duplicate_stored_records_are_dropped() {
        let mut store = MemoryStore::new();
        store
            .set(
                "comparison",
                r#"[{"number":1,"name":"a","elo":1600,"matches":2},
                    {"number":1,"name":"a","elo":1400,"matches":9}]"#,
            )
            .unwrap();
        let engine = RatingEngine::new(EngineConfig::default(), Box::new(store));
        assert_eq!(engine.seen(), 1);
        assert_eq!(engine.get(1).unwrap().elo, 1600.0);
    }

    #[test]
    fn test_total_matches_keeps_half_match() {
        let mut store = MemoryStore::new();
        store
            .set(
                "comparison",
                r#"[{"number":1,"name":"a","elo":1600,"matches":3},
                    {"number":2,"name":"b","elo":1400,"matches":2}]"#,
            )
            .unwrap();
        let engine = RatingEngine::new(EngineConfig::default(), Box::new(store));
        assert_eq!(engine.total_matches(), 2.5);
    }

    #[test]
    fn test_corrupt_store_starts_empty() {
        let mut store = MemoryStore::new();
        store.set("comparison", "{not json").unwrap();
        let mut engine = RatingEngine::new(EngineConfig::default(), Box::new(store));
        assert_eq!(engine.seen(), 0);
        assert!(!engine.is_degraded());
        engine.record_comparison(&entity(1), &entity(2)).unwrap();
        assert_eq!(engine.seen(), 2);
    }

    #[test]
    fn test_unavailable_store_degrades_to_memory() {
        let mut engine = RatingEngine::new(EngineConfig::default(), Box::new(UnavailableStore));
        assert!(engine.is_degraded());
        engine.record_comparison(&entity(1), &entity(2)).unwrap();
        assert_eq!(engine.get(1).unwrap().elo, 1900.0);
        engine.set_winner_stays(true);
        assert!(!engine.winner_stays());
    }

    #[test]
    fn test_self_comparison_rejected() {
        let mut engine = engine();
        let result = engine.record_comparison(&entity(1), &entity(1));
        assert_eq!(result, Err(SelectionError::SelfComparison(1)));
        assert_eq!(engine.seen(), 0);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut engine = engine();
        engine.record_comparison(&entity(1), &entity(2)).unwrap();

        engine.reset();
        let once = engine.records().to_vec();
        engine.reset();
        assert_eq!(engine.records(), once.as_slice());
        assert!(engine.records().is_empty());
        assert_eq!(engine.most_matches(), 0);
    }

    #[test]
    fn test_winner_stays_flag() {
        let mut engine = engine();
        assert!(!engine.winner_stays());
        engine.set_winner_stays(true);
        assert!(engine.winner_stays());
        engine.set_winner_stays(false);
        assert!(!engine.winner_stays());
    }
}
