use crate::error::SelectionError;
use crate::types::EngineConfig;
use rand::seq::{index, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How the next pair is chosen after a comparison
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PairingPolicy {
    #[default]
    Random,
    /// Keep the winner seated until its match count catches up
    WinnerStays,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Side {
    Left,
    Right,
}

/// Indices of the two entities on display. Always distinct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub left: usize,
    pub right: usize,
}

impl Pair {
    pub fn get(&self, side: Side) -> usize {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.left == index || self.right == index
    }
}

/// What the selector needs to know about the comparison just recorded
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Outcome {
    pub winner: Side,
    /// Loser's rating before the comparison was applied
    pub loser_elo_before: f64,
    /// Winner's match count including this comparison
    pub winner_matches: u32,
    /// Highest match count across all records before this comparison
    pub most_matches: u32,
    /// Consecutive earlier wins by the same winner
    pub winner_streak: u32,
}

/// Chooses which two entities are shown next
#[derive(Clone, Debug)]
pub struct MatchSelector {
    pool_size: usize,
    pair: Pair,
    policy: PairingPolicy,
    replacement_threshold: f64,
    grace: u32,
}

impl MatchSelector {
    pub fn new(pool_size: usize, config: &EngineConfig, rng: &mut impl Rng) -> Result<Self, SelectionError> {
        let pair = Self::random_pair(pool_size, rng)?;
        Ok(Self {
            pool_size,
            pair,
            policy: PairingPolicy::Random,
            replacement_threshold: config.replacement_threshold,
            grace: config.winner_stays_grace,
        })
    }

    /// Two distinct uniform indices below `pool_size`
    pub fn random_pair(pool_size: usize, rng: &mut impl Rng) -> Result<Pair, SelectionError> {
        if pool_size < 2 {
            return Err(SelectionError::PoolTooSmall(pool_size));
        }
        let picked = index::sample(rng, pool_size, 2);
        Ok(Pair {
            left: picked.index(0),
            right: picked.index(1),
        })
    }

    pub fn pair(&self) -> Pair {
        self.pair
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn policy(&self) -> PairingPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: PairingPolicy) {
        self.policy = policy;
    }

    /// Replace both slots
    pub fn reshuffle(&mut self, rng: &mut impl Rng) {
        if let Ok(pair) = Self::random_pair(self.pool_size, rng) {
            self.pair = pair;
        }
    }

    /// Whether the winner keeps its seat under the current policy
    pub fn keeps_winner(&self, outcome: &Outcome) -> bool {
        self.policy == PairingPolicy::WinnerStays
            && (outcome.winner_matches < outcome.most_matches || outcome.winner_streak < self.grace)
    }

    /// Move on from the current pair after `outcome`.
    ///
    /// `ratings[i]` is the current rating of entity `i`, or the starting
    /// rating when it has never been compared.
    pub fn select_next(&mut self, outcome: &Outcome, ratings: &[f64], rng: &mut impl Rng) -> Pair {
        if !self.keeps_winner(outcome) {
            self.reshuffle(rng);
            debug!("New random pair {:?}", self.pair);
            return self.pair;
        }

        let kept = self.pair.get(outcome.winner);
        let threshold = outcome.loser_elo_before * self.replacement_threshold;
        match Self::replacement_candidate(ratings, threshold, self.pair, rng) {
            Some(replacement) => {
                match outcome.winner {
                    Side::Left => self.pair.right = replacement,
                    Side::Right => self.pair.left = replacement,
                }
                debug!(
                    "Winner {} stays, challenger {} (threshold {:.1})",
                    kept, replacement, threshold
                );
            }
            None => self.reshuffle(rng),
        }
        self.pair
    }

    /// Uniform pick among entities rated above `threshold`, never either
    /// member of `current`.
    ///
    /// Falls back to any entity outside `current` when nobody clears the
    /// threshold. `None` when the pool holds nothing but `current`.
    pub fn replacement_candidate(
        ratings: &[f64],
        threshold: f64,
        current: Pair,
        rng: &mut impl Rng,
    ) -> Option<usize> {
        let eligible: Vec<usize> = (0..ratings.len())
            .filter(|&i| !current.contains(i) && ratings[i] > threshold)
            .collect();

        if let Some(&choice) = eligible.choose(rng) {
            return Some(choice);
        }

        let everyone: Vec<usize> = (0..ratings.len()).filter(|&i| !current.contains(i)).collect();
        everyone.choose(rng).copied()
    }
}
