//! Sync-engine event stream payloads.

use crate::{
    remote::RemoteError,
    types::{ContactId, EntryId},
};

/// Events emitted from the single-writer engine loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// An optimistic patch was applied to the cache.
    Applied {
        /// Queue entry carrying the mutation.
        entry_id: EntryId,
        /// Patched contact.
        contact_id: ContactId,
    },
    /// A commit attempt failed and the entry was re-queued.
    Retrying {
        /// Queue entry being retried.
        entry_id: EntryId,
        /// Attempts completed so far.
        attempt: u32,
    },
    /// The remote confirmed a mutation; the cache now holds remote truth.
    Committed {
        /// Completed queue entry.
        entry_id: EntryId,
        /// Settled contact.
        contact_id: ContactId,
    },
    /// Retries were exhausted or the remote rejected the mutation; the
    /// cache was restored from the saved snapshot.
    RolledBack {
        /// Failed queue entry.
        entry_id: EntryId,
        /// Contact the mutation targeted.
        contact_id: ContactId,
        /// Terminal remote error.
        error: RemoteError,
    },
    /// A post-settle refetch replaced the cache with remote truth.
    Refetched {
        /// Number of records fetched.
        count: usize,
    },
    /// A post-settle refetch failed; the cache keeps its current state.
    RefetchFailed,
}
