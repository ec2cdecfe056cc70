use serde::{Deserialize, Serialize};

/// Where a stat value sits relative to its comparison set
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PercentileInput<'a> {
    /// Value found in a descending-sorted pool
    PoolBased { value: f64, pool: &'a [f64] },
    /// Linear position between bounds; a missing `min` means 0
    RangeBased { value: f64, min: Option<f64>, max: f64 },
    Unavailable,
}

impl<'a> PercentileInput<'a> {
    /// Pick the branch that applies.
    ///
    /// The pool wins when it contains `value`; otherwise the explicit bounds
    /// are used when a `max` is given.
    pub fn resolve(value: f64, pool: Option<&'a [f64]>, min: Option<f64>, max: Option<f64>) -> Self {
        if let Some(pool) = pool {
            if pool_percentile(value, pool).is_some() {
                return PercentileInput::PoolBased { value, pool };
            }
        }
        match max {
            Some(max) => PercentileInput::RangeBased { value, min, max },
            None => PercentileInput::Unavailable,
        }
    }

    pub fn ratio(&self) -> Option<f64> {
        match *self {
            PercentileInput::PoolBased { value, pool } => pool_percentile(value, pool),
            PercentileInput::RangeBased { value, min, max } => {
                let min = min.unwrap_or(0.0);
                let span = max - min;
                if span == 0.0 {
                    return None;
                }
                Some((value - min) / span)
            }
            PercentileInput::Unavailable => None,
        }
    }

    pub fn tier(&self) -> QualityTier {
        QualityTier::from_ratio(self.ratio())
    }
}

/// `(n - i) / n` where `i` is the first index holding `value` in a
/// descending pool of size `n`.
///
/// The first occurrence wins, so tied values all share the best rank of the
/// tie. `None` when the value is absent, which includes the empty pool.
pub fn pool_percentile(value: f64, pool: &[f64]) -> Option<f64> {
    let index = pool.iter().position(|&v| v == value)?;
    let n = pool.len() as f64;
    Some((n - index as f64) / n)
}

/// Display severity of a stat ratio
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QualityTier {
    Excellent, // > 0.9
    Great,     // > 0.7
    Good,      // > 0.5
    Fair,      // > 0.3
    Poor,      // > 0.1
    Terrible,
    NoData,
}

impl QualityTier {
    pub fn from_ratio(ratio: Option<f64>) -> Self {
        match ratio {
            None => QualityTier::NoData,
            Some(r) if r > 0.9 => QualityTier::Excellent,
            Some(r) if r > 0.7 => QualityTier::Great,
            Some(r) if r > 0.5 => QualityTier::Good,
            Some(r) if r > 0.3 => QualityTier::Fair,
            Some(r) if r > 0.1 => QualityTier::Poor,
            Some(_) => QualityTier::Terrible,
        }
    }
}

/// Tier for a stat row given whatever comparison data is at hand
pub fn stat_tier(value: f64, pool: Option<&[f64]>, min: Option<f64>, max: Option<f64>) -> QualityTier {
    PercentileInput::resolve(value, pool, min, max).tier()
}
