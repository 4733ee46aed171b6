//! Mutation request model and queue-entry lifecycle.

use serde::{Deserialize, Serialize};

use crate::{
    contact::ContactPatch,
    types::{ContactId, EntryId, TsMs},
};

/// A single user-initiated field update against one contact record.
///
/// Immutable once created; consumed exactly once by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRequest {
    /// Target record.
    pub contact_id: ContactId,
    /// Fields to overwrite.
    pub patch: ContactPatch,
}

impl MutationRequest {
    /// Builds a request for `contact_id` carrying `patch`.
    pub fn new(contact_id: ContactId, patch: ContactPatch) -> Self {
        Self { contact_id, patch }
    }
}

/// Lifecycle state of a queued mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryState {
    /// Waiting for the engine to pick it up.
    Pending,
    /// Remote commit attempt in flight.
    Processing,
    /// Remote commit confirmed.
    Completed,
    /// Retries exhausted or rejected; cache rolled back.
    Failed,
}

impl EntryState {
    /// True for the two terminal states.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A [`MutationRequest`] wrapped with queue bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Unique entry identifier.
    pub id: EntryId,
    /// The wrapped request.
    pub request: MutationRequest,
    /// Inverse patch captured when the optimistic apply happened.
    pub prev: Option<ContactPatch>,
    /// Current lifecycle state.
    pub state: EntryState,
    /// Completed remote commit attempts so far.
    pub attempts: u32,
    /// Creation timestamp.
    pub created_ts_ms: TsMs,
}

impl QueueEntry {
    /// Wraps `request` as a fresh pending entry.
    pub fn new(id: EntryId, request: MutationRequest, created_ts_ms: TsMs) -> Self {
        Self {
            id,
            request,
            prev: None,
            state: EntryState::Pending,
            attempts: 0,
            created_ts_ms,
        }
    }

    /// Marks the entry as picked up for a commit attempt.
    ///
    /// Only a pending entry may move to processing.
    pub fn begin_attempt(&mut self) -> bool {
        if self.state != EntryState::Pending {
            return false;
        }
        self.state = EntryState::Processing;
        true
    }

    /// Records a confirmed commit.
    pub fn complete(&mut self) {
        debug_assert_eq!(self.state, EntryState::Processing);
        self.attempts += 1;
        self.state = EntryState::Completed;
    }

    /// Records a failed attempt; re-queues while attempts remain under
    /// `max_retries`, otherwise the entry is terminal.
    ///
    /// This is the only path back to `Pending` from a later state.
    pub fn fail_attempt(&mut self, max_retries: u32) -> EntryState {
        debug_assert_eq!(self.state, EntryState::Processing);
        self.attempts += 1;
        self.state = if self.attempts < max_retries {
            EntryState::Pending
        } else {
            EntryState::Failed
        };
        self.state
    }

    /// Marks the entry terminally failed regardless of remaining attempts.
    ///
    /// Used for remote rejections, which are never retried.
    pub fn reject(&mut self) {
        debug_assert_eq!(self.state, EntryState::Processing);
        self.attempts += 1;
        self.state = EntryState::Failed;
    }
}
