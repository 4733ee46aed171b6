use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use dialsync::{
    call::{
        reconciler::{MonitorConfig, resolve, spawn_call_monitor},
        signal::{CallActivity, CallSignal, CallStatusReport, SourceId},
        sources::SignalSource,
    },
    device::DeviceError,
    types::now_ms,
};

fn signal(source: SourceId, active: bool) -> CallSignal {
    CallSignal {
        source,
        active,
        raw_state: if active { 2 } else { 0 },
        ts_ms: now_ms(),
    }
}

#[test]
fn agreeing_sources_resolve_without_conflict() {
    let status = resolve(
        Some(signal(SourceId::TelephonyRegistry, true)),
        Some(signal(SourceId::TelecomDump, true)),
        12,
    );
    assert_eq!(status.activity, CallActivity::Active);
    assert!(!status.conflict);
    assert_eq!(status.resolved_by, Some(SourceId::TelephonyRegistry));
    assert_eq!(status.raw_call_state, 2);
}

#[test]
fn disagreeing_sources_flag_conflict_and_primary_wins() {
    let status = resolve(
        Some(signal(SourceId::TelephonyRegistry, true)),
        Some(signal(SourceId::TelecomDump, false)),
        5,
    );
    assert_eq!(status.activity, CallActivity::Active);
    assert!(status.conflict);
    assert_eq!(status.resolved_by, Some(SourceId::TelephonyRegistry));

    // The other direction: registry says the call ended.
    let status = resolve(
        Some(signal(SourceId::TelephonyRegistry, false)),
        Some(signal(SourceId::TelecomDump, true)),
        5,
    );
    assert_eq!(status.activity, CallActivity::Idle);
    assert!(status.conflict);
    assert_eq!(status.resolved_by, Some(SourceId::TelephonyRegistry));
}

#[test]
fn lone_responder_is_authoritative() {
    let status = resolve(None, Some(signal(SourceId::TelecomDump, true)), 3);
    assert_eq!(status.activity, CallActivity::Active);
    assert!(!status.conflict);
    assert_eq!(status.resolved_by, Some(SourceId::TelecomDump));
    assert_eq!(status.raw_call_state, -1);
}

#[test]
fn no_responder_degrades_to_unknown() {
    let status = resolve(None, None, 1500);
    assert_eq!(status.activity, CallActivity::Unknown);
    assert!(!status.conflict);
    assert_eq!(status.resolved_by, None);
    assert!(!status.activity.is_known());
    assert!(!status.activity.is_active());
}

#[test]
fn report_enrichment_adds_client_and_total_durations() {
    let status = resolve(
        Some(signal(SourceId::TelephonyRegistry, true)),
        Some(signal(SourceId::TelecomDump, false)),
        40,
    );
    let report = CallStatusReport::from_status(&status).enrich(7);
    assert!(report.call_in_progress);
    assert!(report.detection_conflict);
    assert_eq!(report.m_call_state, 2);
    assert_eq!(report.client_processing_time_ms, Some(7));
    assert_eq!(report.total_detection_time_ms, Some(47));

    let json = serde_json::to_value(&report).expect("serialize");
    assert_eq!(json["telephony_registry_active"], true);
    assert_eq!(json["telecom_dump_active"], false);
    assert_eq!(json["mCallState"], 2);
}

/// Source with a programmable reading and response delay.
struct StubSource {
    id: SourceId,
    reading: Option<bool>,
    delay: Duration,
}

#[async_trait]
impl SignalSource for StubSource {
    fn source_id(&self) -> SourceId {
        self.id
    }

    async fn probe(&self) -> Result<CallSignal, DeviceError> {
        tokio::time::sleep(self.delay).await;
        match self.reading {
            Some(active) => Ok(signal(self.id, active)),
            None => Err(DeviceError::Disconnected),
        }
    }
}

#[tokio::test]
async fn monitor_publishes_conflict_resolution() {
    let primary = Arc::new(StubSource {
        id: SourceId::TelephonyRegistry,
        reading: Some(true),
        delay: Duration::ZERO,
    });
    let secondary = Arc::new(StubSource {
        id: SourceId::TelecomDump,
        reading: Some(false),
        delay: Duration::ZERO,
    });

    let handle = spawn_call_monitor(
        primary,
        secondary,
        MonitorConfig {
            poll_interval_ms: 50,
            probe_timeout_ms: 200,
        },
    );

    let mut rx = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(2), rx.changed())
        .await
        .expect("tick timeout")
        .expect("monitor alive");

    let status = *rx.borrow();
    assert_eq!(status.activity, CallActivity::Active);
    assert!(status.conflict);
    assert_eq!(status.resolved_by, Some(SourceId::TelephonyRegistry));

    handle.shutdown().await;
}

#[tokio::test]
async fn slow_sources_degrade_to_unknown_without_raising() {
    let primary = Arc::new(StubSource {
        id: SourceId::TelephonyRegistry,
        reading: Some(true),
        delay: Duration::from_millis(500),
    });
    let secondary = Arc::new(StubSource {
        id: SourceId::TelecomDump,
        reading: Some(true),
        delay: Duration::from_millis(500),
    });

    let handle = spawn_call_monitor(
        primary,
        secondary,
        MonitorConfig {
            poll_interval_ms: 100,
            probe_timeout_ms: 40,
        },
    );

    let mut rx = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(2), rx.changed())
        .await
        .expect("tick timeout")
        .expect("monitor alive");

    let status = *rx.borrow();
    assert_eq!(status.activity, CallActivity::Unknown);
    assert_eq!(status.resolved_by, None);

    handle.shutdown().await;
}

#[tokio::test]
async fn failed_probe_leaves_the_other_source_authoritative() {
    let primary = Arc::new(StubSource {
        id: SourceId::TelephonyRegistry,
        reading: None,
        delay: Duration::ZERO,
    });
    let secondary = Arc::new(StubSource {
        id: SourceId::TelecomDump,
        reading: Some(true),
        delay: Duration::ZERO,
    });

    let handle = spawn_call_monitor(
        primary,
        secondary,
        MonitorConfig {
            poll_interval_ms: 50,
            probe_timeout_ms: 200,
        },
    );

    let mut rx = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(2), rx.changed())
        .await
        .expect("tick timeout")
        .expect("monitor alive");

    let status = *rx.borrow();
    assert_eq!(status.activity, CallActivity::Active);
    assert!(!status.conflict);
    assert_eq!(status.resolved_by, Some(SourceId::TelecomDump));

    handle.shutdown().await;
}
