//! Explicit mutation queue, one per logical collection.
//!
//! Owned by the engine instance that processes it; there is no ambient or
//! global queue state.

use crate::{
    contact::ContactPatch,
    mutation::{EntryState, MutationRequest, QueueEntry},
    types::{EntryId, TsMs},
};

/// Completed entries older than this are purged.
pub const DEFAULT_RETENTION_MS: u64 = 5 * 60 * 1000;

/// Per-state entry counts, exposed for UI badges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Entries waiting for a commit attempt.
    pub pending: usize,
    /// Entries with a commit attempt in flight.
    pub processing: usize,
    /// Confirmed entries within the retention window.
    pub completed: usize,
    /// Terminally failed entries.
    pub failed: usize,
}

/// FIFO mutation queue with bounded auto-retry bookkeeping.
#[derive(Debug, Default)]
pub struct MutationQueue {
    entries: Vec<QueueEntry>,
    next_entry_id: EntryId,
    retention_ms: u64,
}

impl MutationQueue {
    /// Queue with the default completed-entry retention window.
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION_MS)
    }

    /// Queue with an explicit retention window in milliseconds.
    pub fn with_retention(retention_ms: u64) -> Self {
        Self {
            entries: Vec::new(),
            next_entry_id: 1,
            retention_ms,
        }
    }

    /// Appends a pending entry and returns its id.
    pub fn enqueue(&mut self, request: MutationRequest, now_ms: TsMs) -> EntryId {
        let id = self.next_entry_id;
        self.next_entry_id += 1;
        self.entries.push(QueueEntry::new(id, request, now_ms));
        id
    }

    /// Records the inverse patch captured by the optimistic apply.
    pub fn record_inverse(&mut self, id: EntryId, prev: ContactPatch) {
        if let Some(entry) = self.entry_mut(id) {
            entry.prev = Some(prev);
        }
    }

    /// Moves the oldest pending entry to processing and hands back what the
    /// commit worker needs. Submission order is preserved.
    pub fn begin_next(&mut self) -> Option<(EntryId, MutationRequest, u32)> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.state == EntryState::Pending)?;
        entry.begin_attempt();
        Some((entry.id, entry.request.clone(), entry.attempts))
    }

    /// Marks a processing entry completed.
    pub fn complete(&mut self, id: EntryId) {
        if let Some(entry) = self.entry_mut(id) {
            entry.complete();
        }
    }

    /// Records a failed attempt; returns the resulting state.
    pub fn fail_attempt(&mut self, id: EntryId, max_retries: u32) -> Option<EntryState> {
        self.entry_mut(id).map(|e| e.fail_attempt(max_retries))
    }

    /// Terminally fails a processing entry without further retries.
    pub fn reject(&mut self, id: EntryId) {
        if let Some(entry) = self.entry_mut(id) {
            entry.reject();
        }
    }

    /// Drops completed entries older than the retention window. Returns the
    /// number removed.
    pub fn purge_expired(&mut self, now_ms: TsMs) -> usize {
        let cutoff = now_ms.saturating_sub(self.retention_ms);
        let before = self.entries.len();
        self.entries
            .retain(|e| e.state != EntryState::Completed || e.created_ts_ms > cutoff);
        before - self.entries.len()
    }

    /// Requests of entries not yet settled (pending or in flight), in
    /// submission order.
    pub fn active_requests(&self) -> impl Iterator<Item = &MutationRequest> {
        self.entries
            .iter()
            .filter(|e| !e.state.is_terminal())
            .map(|e| &e.request)
    }

    /// Looks up an entry by id.
    pub fn entry(&self, id: EntryId) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// True when nothing is pending or in flight.
    pub fn is_idle(&self) -> bool {
        !self
            .entries
            .iter()
            .any(|e| matches!(e.state, EntryState::Pending | EntryState::Processing))
    }

    /// Per-state counts.
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for entry in &self.entries {
            match entry.state {
                EntryState::Pending => stats.pending += 1,
                EntryState::Processing => stats.processing += 1,
                EntryState::Completed => stats.completed += 1,
                EntryState::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Total retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_mut(&mut self, id: EntryId) -> Option<&mut QueueEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }
}
