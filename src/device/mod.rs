//! Device boundary: typed commands, backend trait, UI snapshots.

/// Call, SMS, and battery actions built on the backend.
pub mod automation;
/// Typed shell-command builder.
pub mod command;
/// UI-hierarchy snapshot parsing.
pub mod ui;

use async_trait::async_trait;
use thiserror::Error;
use tokio::{process::Command as ProcessCommand, time::Duration};

use crate::device::command::ShellCommand;

/// Device-boundary failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// No device attached, or the bridge binary is missing.
    #[error("device not reachable")]
    Disconnected,
    /// The device ran the command and reported failure.
    #[error("device command failed: {detail}")]
    CommandFailed {
        /// Stderr or shell output describing the failure.
        detail: String,
    },
    /// The command did not finish within the configured timeout.
    #[error("device command timed out")]
    Timeout,
}

/// An attached device reachable over a debug-bridge protocol.
///
/// One interaction action at a time; callers never issue concurrent taps.
#[async_trait]
pub trait DeviceBackend: Send + Sync {
    /// Runs one shell command and returns its stdout.
    async fn shell(&self, command: &ShellCommand) -> Result<String, DeviceError>;
}

/// `adb`-backed implementation of [`DeviceBackend`].
#[derive(Debug, Clone)]
pub struct AdbBackend {
    serial: Option<String>,
    timeout: Duration,
}

impl AdbBackend {
    /// Backend for the single attached device.
    pub fn new(timeout: Duration) -> Self {
        Self {
            serial: None,
            timeout,
        }
    }

    /// Backend pinned to a device serial.
    pub fn with_serial(serial: impl Into<String>, timeout: Duration) -> Self {
        Self {
            serial: Some(serial.into()),
            timeout,
        }
    }
}

#[async_trait]
impl DeviceBackend for AdbBackend {
    async fn shell(&self, command: &ShellCommand) -> Result<String, DeviceError> {
        let mut cmd = ProcessCommand::new("adb");
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.arg("shell");
        cmd.args(command.argv());
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| DeviceError::Timeout)?
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    DeviceError::Disconnected
                } else {
                    DeviceError::CommandFailed {
                        detail: err.to_string(),
                    }
                }
            })?;

        if !output.status.success() {
            let detail = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(DeviceError::CommandFailed { detail });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
