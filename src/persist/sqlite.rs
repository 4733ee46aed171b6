//! SQLite-backed warm-start snapshot store.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::{
    core::store::CacheSnapshotV1,
    persist::{PersistError, PersistResult, SnapshotStore},
    types::now_ms,
};

const SNAPSHOT_FORMAT_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEnvelope {
    format_version: u16,
    snapshot: CacheSnapshotV1,
}

/// SQLite implementation of [`crate::persist::SnapshotStore`].
///
/// One upsert row per collection; the payload is a versioned JSON envelope.
pub struct SqliteSnapshotStore {
    conn: Connection,
}

impl SqliteSnapshotStore {
    /// Opens or creates a snapshot store at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory snapshot store.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn save(&mut self, collection: &str, snapshot: &CacheSnapshotV1) -> PersistResult<()> {
        let env = SnapshotEnvelope {
            format_version: SNAPSHOT_FORMAT_VERSION,
            snapshot: snapshot.clone(),
        };
        let payload = serde_json::to_vec(&env)?;
        self.conn.execute(
            "INSERT INTO cache_snapshots(collection, ts_ms, payload) VALUES (?1, ?2, ?3)
             ON CONFLICT(collection) DO UPDATE SET ts_ms = excluded.ts_ms, payload = excluded.payload",
            params![collection, now_ms() as i64, payload],
        )?;
        Ok(())
    }

    fn load(&mut self, collection: &str) -> PersistResult<Option<CacheSnapshotV1>> {
        let payload: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT payload FROM cache_snapshots WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
            .optional()?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        let env: SnapshotEnvelope = serde_json::from_slice(&payload)?;
        if env.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(PersistError::Message(
                "unsupported snapshot format".to_string(),
            ));
        }
        Ok(Some(env.snapshot))
    }
}
