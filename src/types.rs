//! Shared primitive IDs and timestamp helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Remote-assigned contact identifier.
pub type ContactId = u64;
/// Monotonic mutation-queue entry identifier.
pub type EntryId = u64;
/// Milliseconds since the Unix epoch.
pub type TsMs = u64;

/// Current wall clock in milliseconds since the Unix epoch.
pub fn now_ms() -> TsMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
