//! Contact domain record, draft, and patch types.

use serde::{Deserialize, Serialize};

use crate::types::{ContactId, TsMs};

/// Fully materialized, authoritative contact record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Stable contact identifier, assigned by the remote store.
    pub id: ContactId,
    /// Display name.
    pub name: String,
    /// Dialable phone number.
    pub phone: String,
    /// Free-form workflow status (e.g. "new", "called").
    pub status: String,
    /// Free-form operator comment.
    pub comment: String,
    /// Timestamp of the last completed call, if any.
    pub call_ts_ms: Option<TsMs>,
    /// Timestamp of the scheduled callback, if any.
    pub callback_ts_ms: Option<TsMs>,
    /// True while a tracked call to this contact is in progress.
    pub in_call: bool,
    /// Duration of the last completed call in seconds.
    pub call_duration_secs: Option<u32>,
}

/// Insert payload used to create a new [`ContactRecord`] remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDraft {
    /// Display name.
    pub name: String,
    /// Dialable phone number.
    pub phone: String,
    /// Initial workflow status.
    pub status: String,
    /// Initial comment.
    pub comment: String,
}

/// Sparse patch where each `Some` field overwrites the record value.
///
/// Also serves as the HTTP update body: unset fields are omitted from the
/// serialized JSON.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContactPatch {
    /// Optional replacement for the display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional replacement for the phone number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Optional replacement for the workflow status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Optional replacement for the comment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Optional replacement for the last-call timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_ts_ms: Option<TsMs>,
    /// Optional replacement for the callback timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_ts_ms: Option<TsMs>,
    /// Optional replacement for the in-call flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_call: Option<bool>,
    /// Optional replacement for the call duration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_duration_secs: Option<u32>,
}

impl ContactPatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Captures an inverse patch for all fields present in `self`.
    pub fn capture_inverse_for(&self, rec: &ContactRecord) -> Self {
        Self {
            name: self.name.as_ref().map(|_| rec.name.clone()),
            phone: self.phone.as_ref().map(|_| rec.phone.clone()),
            status: self.status.as_ref().map(|_| rec.status.clone()),
            comment: self.comment.as_ref().map(|_| rec.comment.clone()),
            call_ts_ms: self.call_ts_ms.and(rec.call_ts_ms),
            callback_ts_ms: self.callback_ts_ms.and(rec.callback_ts_ms),
            in_call: self.in_call.map(|_| rec.in_call),
            call_duration_secs: self.call_duration_secs.and(rec.call_duration_secs),
        }
    }

    /// Applies this patch in place to `rec`.
    pub fn apply_to(&self, rec: &mut ContactRecord) {
        if let Some(v) = &self.name {
            rec.name = v.clone();
        }
        if let Some(v) = &self.phone {
            rec.phone = v.clone();
        }
        if let Some(v) = &self.status {
            rec.status = v.clone();
        }
        if let Some(v) = &self.comment {
            rec.comment = v.clone();
        }
        if let Some(v) = self.call_ts_ms {
            rec.call_ts_ms = Some(v);
        }
        if let Some(v) = self.callback_ts_ms {
            rec.callback_ts_ms = Some(v);
        }
        if let Some(v) = self.in_call {
            rec.in_call = v;
        }
        if let Some(v) = self.call_duration_secs {
            rec.call_duration_secs = Some(v);
        }
    }
}
