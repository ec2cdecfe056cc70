use thiserror::Error;

/// Errors raised while choosing the next pair
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("pairing needs at least 2 entities, pool has {0}")]
    PoolTooSmall(usize),

    #[error("entity {0} cannot be compared with itself")]
    SelfComparison(u32),

    #[error("entity number {0} appears more than once in the pool")]
    DuplicateEntity(u32),
}

/// Errors raised by pick/ban bookkeeping
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("ban limit of {0} reached")]
    BanLimitReached(usize),

    #[error("{player} has picked enough ({limit})")]
    PickLimitReached { player: String, limit: usize },

    #[error("unknown species: {0}")]
    UnknownSpecies(String),

    #[error("unknown player index: {0}")]
    UnknownPlayer(usize),

    #[error("draft needs {required} species, only {available} given")]
    NotEnoughSpecies { required: usize, available: usize },
}

/// Errors raised by a rating store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while reading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("unknown stat dimension: {0}")]
    UnknownDimension(String),
}
