//! Debug-bridge detection sources.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    call::signal::{CallSignal, SourceId},
    device::{DeviceBackend, DeviceError, command::ShellCommand},
    types::now_ms,
};

/// One independent call-activity detection source.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Which source this is.
    fn source_id(&self) -> SourceId;

    /// Takes one reading. Expected to finish well inside the poll timeout.
    async fn probe(&self) -> Result<CallSignal, DeviceError>;
}

/// Primary source: telephony registry `mCallState`.
///
/// `mCallState=0` is a strong end-of-call indicator, which is why this
/// source wins conflicts.
pub struct TelephonyRegistrySource {
    backend: Arc<dyn DeviceBackend>,
}

impl TelephonyRegistrySource {
    /// Source reading through `backend`.
    pub fn new(backend: Arc<dyn DeviceBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl SignalSource for TelephonyRegistrySource {
    fn source_id(&self) -> SourceId {
        SourceId::TelephonyRegistry
    }

    async fn probe(&self) -> Result<CallSignal, DeviceError> {
        let output = self
            .backend
            .shell(&ShellCommand::DumpTelephonyRegistry)
            .await?;
        let value = parse_call_state(&output);
        Ok(CallSignal {
            source: SourceId::TelephonyRegistry,
            active: value > 0,
            raw_state: value,
            ts_ms: now_ms(),
        })
    }
}

/// Secondary source: telecom dump of live calls.
pub struct TelecomDumpSource {
    backend: Arc<dyn DeviceBackend>,
}

impl TelecomDumpSource {
    /// Source reading through `backend`.
    pub fn new(backend: Arc<dyn DeviceBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl SignalSource for TelecomDumpSource {
    fn source_id(&self) -> SourceId {
        SourceId::TelecomDump
    }

    async fn probe(&self) -> Result<CallSignal, DeviceError> {
        let output = self.backend.shell(&ShellCommand::DumpTelecom).await?;
        let calls = count_live_calls(&output);
        Ok(CallSignal {
            source: SourceId::TelecomDump,
            active: calls > 0,
            raw_state: calls,
            ts_ms: now_ms(),
        })
    }
}

/// Extracts the first `mCallState=N` value; a missing line reads as idle.
fn parse_call_state(output: &str) -> i32 {
    for line in output.lines() {
        if !line.contains("mCallState") {
            continue;
        }
        if let Some((_, value)) = line.split_once('=')
            && let Ok(value) = value.trim().parse::<i32>()
        {
            return value;
        }
    }
    0
}

/// Counts calls in a state that makes the line count as live.
fn count_live_calls(output: &str) -> i32 {
    output
        .lines()
        .filter(|line| {
            line.contains("Call id=")
                && (line.contains("state=DIALING")
                    || line.contains("state=ACTIVE")
                    || line.contains("state=CONNECTING"))
        })
        .count() as i32
}
