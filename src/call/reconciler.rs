use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{Duration, Instant, MissedTickBehavior},
};

use std::sync::Arc;

use crate::{
    call::{
        signal::{CallActivity, CallSignal, CallStatus},
        sources::SignalSource,
    },
    types::now_ms,
};

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Fixed spacing between poll ticks, in milliseconds.
    pub poll_interval_ms: u64,
    /// Per-source probe timeout; must stay under the poll interval.
    pub probe_timeout_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            probe_timeout_ms: 1_500,
        }
    }
}

/// Merges up to two same-tick readings into one authoritative status.
///
/// A lone responder is authoritative. When both respond and disagree the
/// primary source wins and the conflict is flagged for observability; the
/// conflict never withholds a value. No responder at all degrades to
/// `Unknown`.
pub fn resolve(
    primary: Option<CallSignal>,
    secondary: Option<CallSignal>,
    detection_time_ms: u64,
) -> CallStatus {
    let (activity, resolved_by, conflict) = match (&primary, &secondary) {
        (None, None) => (CallActivity::Unknown, None, false),
        (Some(p), None) => (activity_of(p.active), Some(p.source), false),
        (None, Some(s)) => (activity_of(s.active), Some(s.source), false),
        (Some(p), Some(s)) => {
            let conflict = p.active != s.active;
            (activity_of(p.active), Some(p.source), conflict)
        }
    };

    CallStatus {
        activity,
        resolved_by,
        conflict,
        raw_call_state: primary.map(|p| p.raw_state).unwrap_or(-1),
        primary_active: primary.map(|p| p.active),
        secondary_active: secondary.map(|s| s.active),
        detection_time_ms,
        resolved_ts_ms: now_ms(),
    }
}

fn activity_of(active: bool) -> CallActivity {
    if active {
        CallActivity::Active
    } else {
        CallActivity::Idle
    }
}

enum MonitorCommand {
    Shutdown { resp: oneshot::Sender<()> },
}

/// Handle over the poll loop; the latest status is read through a watch
/// channel so a new tick implicitly supersedes a stale one.
pub struct CallMonitorHandle {
    cmd_tx: mpsc::Sender<MonitorCommand>,
    status_rx: watch::Receiver<CallStatus>,
}

impl Clone for CallMonitorHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            status_rx: self.status_rx.clone(),
        }
    }
}

impl CallMonitorHandle {
    /// Most recently resolved status.
    pub fn latest(&self) -> CallStatus {
        *self.status_rx.borrow()
    }

    /// Watch channel carrying every resolved status.
    pub fn subscribe(&self) -> watch::Receiver<CallStatus> {
        self.status_rx.clone()
    }

    /// Stops the poll loop.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(MonitorCommand::Shutdown { resp: tx })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}

/// Spawns the fixed-interval reconciliation loop.
pub fn spawn_call_monitor(
    primary: Arc<dyn SignalSource>,
    secondary: Arc<dyn SignalSource>,
    config: MonitorConfig,
) -> CallMonitorHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<MonitorCommand>(8);
    let (status_tx, status_rx) = watch::channel(CallStatus::startup());

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(config.poll_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let probe_timeout = Duration::from_millis(config.probe_timeout_ms);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(MonitorCommand::Shutdown { resp }) => {
                            let _ = resp.send(());
                            break;
                        }
                        None => break,
                    }
                }
                _ = interval.tick() => {
                    let status = poll_once(&*primary, &*secondary, probe_timeout).await;
                    if status.conflict {
                        tracing::warn!(
                            method = %status.detection_method(),
                            "call-state sources disagree"
                        );
                    }
                    tracing::debug!(
                        activity = ?status.activity,
                        detection_time_ms = status.detection_time_ms,
                        "call status resolved"
                    );
                    let _ = status_tx.send(status);
                }
            }
        }
    });

    CallMonitorHandle { cmd_tx, status_rx }
}

/// One poll tick: both sources probed concurrently under the timeout.
///
/// A timed-out or failed probe contributes nothing to the tick; it is not
/// retried until the next tick and never raises to the caller.
async fn poll_once(
    primary: &dyn SignalSource,
    secondary: &dyn SignalSource,
    probe_timeout: Duration,
) -> CallStatus {
    let started = Instant::now();
    let (p, s) = tokio::join!(
        tokio::time::timeout(probe_timeout, primary.probe()),
        tokio::time::timeout(probe_timeout, secondary.probe()),
    );
    let detection_time_ms = started.elapsed().as_millis() as u64;

    resolve(
        settle_probe(p, primary.source_id()),
        settle_probe(s, secondary.source_id()),
        detection_time_ms,
    )
}

fn settle_probe(
    result: Result<Result<CallSignal, crate::device::DeviceError>, tokio::time::error::Elapsed>,
    source: crate::call::signal::SourceId,
) -> Option<CallSignal> {
    match result {
        Ok(Ok(signal)) => Some(signal),
        Ok(Err(err)) => {
            tracing::debug!(%source, error = %err, "signal probe failed");
            None
        }
        Err(_) => {
            tracing::debug!(%source, "signal probe timed out");
            None
        }
    }
}
