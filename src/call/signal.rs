//! Call-activity signals and the merged authoritative status.

use serde::Serialize;

use crate::types::TsMs;

/// Identity of a call-activity detection source.
///
/// The telephony registry is the primary source and wins conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// Low-level telephony registry (`mCallState`).
    TelephonyRegistry,
    /// Telecom-stack dump of active/dialing/connecting calls.
    TelecomDump,
}

impl SourceId {
    /// True for the conflict-winning source.
    pub fn is_primary(self) -> bool {
        matches!(self, Self::TelephonyRegistry)
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TelephonyRegistry => f.write_str("telephony_registry"),
            Self::TelecomDump => f.write_str("telecom_dump"),
        }
    }
}

/// One reading from one source. Ephemeral; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSignal {
    /// Source that produced the reading.
    pub source: SourceId,
    /// Whether the source sees an active call.
    pub active: bool,
    /// Raw state code (registry `mCallState`, or the telecom call count).
    pub raw_state: i32,
    /// When the reading was taken.
    pub ts_ms: TsMs,
}

/// Tri-state call activity.
///
/// `Unknown` means "no authoritative information", never "no call".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallActivity {
    /// A call is in progress.
    Active,
    /// No call is in progress.
    Idle,
    /// Neither source responded this tick.
    Unknown,
}

impl CallActivity {
    /// True only for [`CallActivity::Active`].
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// True when the tick produced authoritative information.
    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Authoritative merged view, recomputed whole on every poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallStatus {
    /// Merged call activity.
    pub activity: CallActivity,
    /// Source whose value won, when any responded.
    pub resolved_by: Option<SourceId>,
    /// True iff both sources responded this tick and disagreed.
    pub conflict: bool,
    /// Registry `mCallState`, `-1` when the registry was silent.
    pub raw_call_state: i32,
    /// What the primary source reported, when it responded.
    pub primary_active: Option<bool>,
    /// What the secondary source reported, when it responded.
    pub secondary_active: Option<bool>,
    /// Device-side probing duration for this tick.
    pub detection_time_ms: u64,
    /// When this status was resolved.
    pub resolved_ts_ms: TsMs,
}

impl CallStatus {
    /// Status before the first tick completes.
    pub fn startup() -> Self {
        Self {
            activity: CallActivity::Unknown,
            resolved_by: None,
            conflict: false,
            raw_call_state: -1,
            primary_active: None,
            secondary_active: None,
            detection_time_ms: 0,
            resolved_ts_ms: 0,
        }
    }

    /// Human-readable description of how the value was decided.
    pub fn detection_method(&self) -> String {
        match (self.resolved_by, self.conflict) {
            (Some(source), true) => {
                format!("conflict resolved: {source} wins")
            }
            (Some(source), false) => match (self.primary_active, self.secondary_active) {
                (Some(_), Some(_)) => "both sources agree".to_string(),
                _ => format!("{source} only responder"),
            },
            (None, _) => "no source responded".to_string(),
        }
    }
}

/// Wire shape of a resolved status, as forwarded to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallStatusReport {
    /// True when a call is in progress (unknown reports as false here;
    /// consult `activity` for the tri-state value).
    pub call_in_progress: bool,
    /// Tri-state activity.
    pub activity: CallActivity,
    /// Primary source reading, when it responded.
    pub telephony_registry_active: Option<bool>,
    /// Secondary source reading, when it responded.
    pub telecom_dump_active: Option<bool>,
    /// Raw registry state code.
    #[serde(rename = "mCallState")]
    pub m_call_state: i32,
    /// Resolution description.
    pub detection_method: String,
    /// True when the sources disagreed.
    pub detection_conflict: bool,
    /// Device-side probing duration.
    pub detection_time_ms: u64,
    /// Caller-side processing duration, filled by [`Self::enrich`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_processing_time_ms: Option<u64>,
    /// Device plus caller duration, filled by [`Self::enrich`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_detection_time_ms: Option<u64>,
}

impl CallStatusReport {
    /// Projects a resolved status onto the wire shape.
    pub fn from_status(status: &CallStatus) -> Self {
        Self {
            call_in_progress: status.activity.is_active(),
            activity: status.activity,
            telephony_registry_active: status.primary_active,
            telecom_dump_active: status.secondary_active,
            m_call_state: status.raw_call_state,
            detection_method: status.detection_method(),
            detection_conflict: status.conflict,
            detection_time_ms: status.detection_time_ms,
            client_processing_time_ms: None,
            total_detection_time_ms: None,
        }
    }

    /// Adds the caller-side processing duration before forwarding.
    pub fn enrich(mut self, client_processing_time_ms: u64) -> Self {
        self.client_processing_time_ms = Some(client_processing_time_ms);
        self.total_detection_time_ms = Some(self.detection_time_ms + client_processing_time_ms);
        self
    }
}
