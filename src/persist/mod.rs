pub mod sqlite;

use thiserror::Error;

use crate::core::store::CacheSnapshotV1;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    Message(String),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Warm-start persistence of the last-hydrated cache, keyed by collection.
///
/// The stored blob is opaque and never authoritative; it only primes the
/// cache across process restarts.
pub trait SnapshotStore: Send {
    fn save(&mut self, collection: &str, snapshot: &CacheSnapshotV1) -> PersistResult<()>;
    fn load(&mut self, collection: &str) -> PersistResult<Option<CacheSnapshotV1>>;
}
