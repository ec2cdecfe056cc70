use crate::error::SelectionError;
use crate::matchmaker::{MatchSelector, Outcome, Pair, PairingPolicy, Side};
use crate::rating::{RankedRecord, RatingEngine};
use crate::storage::KeyValueStore;
use crate::types::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// One side of the pair on display, with its rating if it has one
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contender {
    pub index: usize,
    pub number: u32,
    pub name: String,
    pub image: Option<String>,
    pub elo: Option<f64>,
    pub matches: u32,
    /// Position among all ratings, 1.0 for the top
    pub percentile: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairView {
    pub left: Contender,
    pub right: Contender,
}

/// Aggregates shown next to the comparison
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub pool_size: usize,
    pub seen: usize,
    /// Half the summed match counts; fractional when stored records disagree
    pub total_matches: f64,
    pub most_matches: u32,
    pub winner_stays: bool,
    /// Ratings only live in this session
    pub degraded: bool,
    pub recent: Option<MatchHistoryEntry>,
}

/// A pairwise favourites session: ratings, pairing and the latest result
pub struct FavesSession {
    entities: Vec<Entity>,
    engine: RatingEngine,
    selector: MatchSelector,
    rng_seed: u64,
    /// Comparisons made, mixed into the seed of each step
    step: u64,
    recent: Option<MatchHistoryEntry>,
    winner_streak: u32,
    degraded_reported: bool,
}

impl FavesSession {
    pub fn new(
        entities: Vec<Entity>,
        config: EngineConfig,
        store: Box<dyn KeyValueStore>,
        seed: u64,
    ) -> Result<Self, SelectionError> {
        // Ratings are keyed by number, so two entries sharing one could never be compared
        let mut numbers = HashSet::new();
        if let Some(duplicate) = entities.iter().find(|e| !numbers.insert(e.number)) {
            return Err(SelectionError::DuplicateEntity(duplicate.number));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut selector = MatchSelector::new(entities.len(), &config, &mut rng)?;
        let engine = RatingEngine::new(config, store);

        if engine.winner_stays() {
            selector.set_policy(PairingPolicy::WinnerStays);
        }

        Ok(Self {
            entities,
            engine,
            selector,
            rng_seed: seed,
            step: 0,
            recent: None,
            winner_streak: 0,
            degraded_reported: false,
        })
    }

    fn next_rng(&mut self) -> StdRng {
        self.step += 1;
        StdRng::seed_from_u64(self.rng_seed.wrapping_add(self.step))
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn engine(&self) -> &RatingEngine {
        &self.engine
    }

    pub fn pair(&self) -> Pair {
        self.selector.pair()
    }

    fn contender(&self, index: usize) -> Contender {
        let entity = &self.entities[index];
        let record = self.engine.get(entity.number);
        Contender {
            index,
            number: entity.number,
            name: entity.name.clone(),
            image: entity.image.clone(),
            elo: record.map(|r| r.elo),
            matches: record.map(|r| r.matches).unwrap_or(0),
            percentile: self.engine.percentile_position(entity.number),
        }
    }

    pub fn current_pair(&self) -> PairView {
        let pair = self.selector.pair();
        PairView {
            left: self.contender(pair.left),
            right: self.contender(pair.right),
        }
    }

    /// Record the entity on `side` as the winner and move to the next pair
    pub fn choose(&mut self, side: Side) -> Result<MatchHistoryEntry, SelectionError> {
        let pair = self.selector.pair();
        let (winner_index, loser_index) = match side {
            Side::Left => (pair.left, pair.right),
            Side::Right => (pair.right, pair.left),
        };

        let most_matches = self.engine.most_matches();
        let winner = &self.entities[winner_index];
        let loser = &self.entities[loser_index];
        let loser_elo_before = self.engine.elo_or_default(loser.number);

        let entry = self.engine.record_comparison(winner, loser)?;

        let outcome = Outcome {
            winner: side,
            loser_elo_before,
            winner_matches: self.engine.matches_of(winner.number),
            most_matches,
            winner_streak: self.winner_streak,
        };

        let ratings = self.ratings_by_index();
        let mut rng = self.next_rng();
        let next = self.selector.select_next(&outcome, &ratings, &mut rng);
        debug!("Next pair {:?} after {:?}", next, outcome);

        let repeat = self
            .recent
            .as_ref()
            .map_or(false, |r| r.winner.number == entry.winner.number);
        self.winner_streak = if repeat { self.winner_streak + 1 } else { 0 };
        self.recent = Some(entry.clone());

        Ok(entry)
    }

    /// Rating of every pool entity by index, starting rating when unseen
    fn ratings_by_index(&self) -> Vec<f64> {
        let index = self.engine.elo_index();
        let starting_elo = self.engine.config().starting_elo;
        self.entities
            .iter()
            .map(|e| index.get(&e.number).copied().unwrap_or(starting_elo))
            .collect()
    }

    /// True exactly once, the first time ratings stop being persisted
    pub fn take_degraded_notice(&mut self) -> bool {
        if self.engine.is_degraded() && !self.degraded_reported {
            self.degraded_reported = true;
            return true;
        }
        false
    }

    pub fn recent(&self) -> Option<&MatchHistoryEntry> {
        self.recent.as_ref()
    }

    pub fn winner_stays(&self) -> bool {
        self.selector.policy() == PairingPolicy::WinnerStays
    }

    pub fn set_winner_stays(&mut self, enabled: bool) {
        let policy = if enabled {
            PairingPolicy::WinnerStays
        } else {
            PairingPolicy::Random
        };
        self.selector.set_policy(policy);
        self.engine.set_winner_stays(enabled);
    }

    /// Forget every rating and start over with a fresh random pair
    pub fn reset(&mut self) {
        self.engine.reset();
        self.set_winner_stays(false);
        self.recent = None;
        self.winner_streak = 0;
        let mut rng = self.next_rng();
        self.selector.reshuffle(&mut rng);
    }

    pub fn top(&self) -> Vec<RatingRecord> {
        self.engine.top_n(self.engine.config().top_list_size)
    }

    pub fn bottom(&self) -> Vec<RatingRecord> {
        self.engine.bottom_n(self.engine.config().top_list_size)
    }

    pub fn ranking(&self) -> Vec<RankedRecord> {
        self.engine.ranked()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            pool_size: self.entities.len(),
            seen: self.engine.seen(),
            total_matches: self.engine.total_matches(),
            most_matches: self.engine.most_matches(),
            winner_stays: self.winner_stays(),
            degraded: self.engine.is_degraded(),
            recent: self.recent.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::storage::{MemoryStore, UnavailableStore};

    /// Reads fine, refuses every write
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("quota exceeded".to_string()))
        }

        fn remove(&mut self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn pool(size: u32) -> Vec<Entity> {
        (1..=size)
            .map(|n| Entity::new(n, &format!("mon-{}", n), BaseStats::new(50, 50, 50, 50, 50, 50)))
            .collect()
    }

    fn session(size: u32, seed: u64) -> FavesSession {
        FavesSession::new(pool(size), EngineConfig::default(), Box::new(MemoryStore::new()), seed).unwrap()
    }

    #[test]
    fn test_needs_two_entities() {
        let result = FavesSession::new(pool(1), EngineConfig::default(), Box::new(MemoryStore::new()), 1);
        assert_eq!(result.err(), Some(SelectionError::PoolTooSmall(1)));
    }

    #[test]
    fn test_duplicate_numbers_rejected() {
        let mut entities = pool(3);
        entities.push(Entity::new(2, "mon-2-again", BaseStats::new(60, 60, 60, 60, 60, 60)));
        let result = FavesSession::new(entities, EngineConfig::default(), Box::new(MemoryStore::new()), 1);
        assert_eq!(result.err(), Some(SelectionError::DuplicateEntity(2)));

        let twins = vec![
            Entity::new(7, "twin-a", BaseStats::new(50, 50, 50, 50, 50, 50)),
            Entity::new(7, "twin-b", BaseStats::new(50, 50, 50, 50, 50, 50)),
        ];
        let result = FavesSession::new(twins, EngineConfig::default(), Box::new(MemoryStore::new()), 1);
        assert_eq!(result.err(), Some(SelectionError::DuplicateEntity(7)));
    }

    #[test]
    fn test_choose_updates_ratings_and_history() {
        let mut session = session(6, 11);
        let before = session.current_pair();
        assert_eq!(before.left.elo, None);

        let entry = session.choose(Side::Right).unwrap();
        assert_eq!(entry.winner.number, before.right.number);
        assert_eq!(entry.winner.after, 1900.0);
        assert_eq!(entry.loser.after, 1100.0);
        assert_eq!(entry.winner.change_label(), "+400");
        assert_eq!(session.recent(), Some(&entry));

        let summary = session.summary();
        assert_eq!(summary.seen, 2);
        assert_eq!(summary.total_matches, 1.0);
        assert!(!summary.degraded);

        let pair = session.pair();
        assert_ne!(pair.left, pair.right);
    }

    #[test]
    fn test_winner_stays_while_behind() {
        let mut session = session(8, 12);
        for _ in 0..5 {
            session.choose(Side::Left).unwrap();
        }
        session.set_winner_stays(true);

        for _ in 0..50 {
            let pair = session.pair();
            let left = session.entities()[pair.left].number;
            let right = session.entities()[pair.right].number;
            // pick the less played side so both branches get exercised
            let side = if session.engine().matches_of(left) <= session.engine().matches_of(right) {
                Side::Left
            } else {
                Side::Right
            };
            let winner_index = pair.get(side);
            let winner_number = session.entities()[winner_index].number;
            let most_before = session.engine().most_matches();

            session.choose(side).unwrap();

            let behind = session.engine().matches_of(winner_number) < most_before;
            if behind {
                assert_eq!(session.pair().get(side), winner_index);
            }
            assert_ne!(session.pair().left, session.pair().right);
        }
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut session = session(4, 13);
        session.set_winner_stays(true);
        session.choose(Side::Left).unwrap();
        session.choose(Side::Left).unwrap();

        session.reset();
        assert!(session.ranking().is_empty());
        assert!(!session.winner_stays());
        assert!(session.recent().is_none());

        session.reset();
        assert!(session.ranking().is_empty());
        assert_eq!(session.summary().total_matches, 0.0);
    }

    #[test]
    fn test_winner_stays_flag_survives_sessions() {
        let mut store = MemoryStore::new();
        store.set("winner_stays", "true").unwrap();
        let session = FavesSession::new(pool(3), EngineConfig::default(), Box::new(store), 1).unwrap();
        assert!(session.winner_stays());
    }

    #[test]
    fn test_unavailable_storage_still_plays() {
        let mut session =
            FavesSession::new(pool(3), EngineConfig::default(), Box::new(UnavailableStore), 14).unwrap();
        session.choose(Side::Left).unwrap();
        let summary = session.summary();
        assert!(summary.degraded);
        assert_eq!(summary.seen, 2);
    }

    #[test]
    fn test_top_and_bottom_lists() {
        let mut session = session(30, 15);
        for _ in 0..40 {
            session.choose(Side::Left).unwrap();
        }
        let top = session.top();
        let bottom = session.bottom();
        assert!(top.len() <= 10);
        assert!(bottom.len() <= 10);
        assert!(top.windows(2).all(|w| w[0].elo >= w[1].elo));
        assert!(bottom.windows(2).all(|w| w[0].elo <= w[1].elo));

        let ranking = session.ranking();
        assert_eq!(ranking[0].rank, 1);
        assert_eq!(ranking[0].record, top[0]);
    }

    #[test]
    fn test_failed_save_is_noticed_once() {
        let mut session = FavesSession::new(pool(4), EngineConfig::default(), Box::new(ReadOnlyStore), 16).unwrap();
        assert!(!session.summary().degraded);
        assert!(!session.take_degraded_notice());

        session.choose(Side::Left).unwrap();
        assert!(session.summary().degraded);
        assert!(session.take_degraded_notice());
        assert!(!session.take_degraded_notice());

        session.choose(Side::Right).unwrap();
        assert!(!session.take_degraded_notice());
        assert_eq!(session.summary().seen, session.engine().seen());
    }

    #[test]
    fn test_unavailable_storage_noticed_at_start() {
        let mut session =
            FavesSession::new(pool(3), EngineConfig::default(), Box::new(UnavailableStore), 17).unwrap();
        assert!(session.take_degraded_notice());
        assert!(!session.take_degraded_notice());
    }
}
