//! Call-control actions against the attached device.

use std::sync::Arc;

use thiserror::Error;
use tokio::time::Duration;

use crate::{
    device::{DeviceBackend, DeviceError, command::ShellCommand, ui::UiSnapshot},
    fallback::{
        FallbackConfig, FallbackError, execute_ordered, plan::FallbackAttempt, resolve_ambiguity,
    },
};

/// Settings for the automation flows.
#[derive(Debug, Clone)]
pub struct AutomationConfig {
    /// Wait after launching the dial intent before checking for a chooser
    /// dialog.
    pub chooser_grace_ms: u64,
    /// Text markers identifying the SIM chooser dialog.
    pub chooser_markers: Vec<String>,
    /// Chooser option to select when the dialog appears.
    pub sim_goal_label: String,
    /// Fallback-engine tuning.
    pub fallback: FallbackConfig,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            chooser_grace_ms: 2_000,
            chooser_markers: vec![
                "Choose SIM for this call".to_string(),
                "Choisir la carte SIM pour cet appel".to_string(),
            ],
            sim_goal_label: "Pro".to_string(),
            fallback: FallbackConfig::default(),
        }
    }
}

/// Automation failures, separated so callers can render each actionably.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AutomationError {
    /// The intent was sent but the device never confirmed the activity.
    #[error("activity launch not confirmed: {detail}")]
    Launch {
        /// Raw launcher output.
        detail: String,
    },
    /// Hard device failure (disconnected, command error, timeout).
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// The primary action worked but the follow-up ambiguity could not be
    /// cleared.
    #[error(transparent)]
    Fallback(#[from] FallbackError),
}

/// Result of placing a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPlacement {
    /// True when the SIM chooser dialog appeared after dialing.
    pub chooser_detected: bool,
    /// Candidate that dismissed the chooser, when one was needed.
    pub sim_selected: Option<FallbackAttempt>,
}

/// Parsed battery dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatteryStatus {
    /// Charge level 0–100, when reported.
    pub level: Option<u8>,
    /// True when on AC power, when reported.
    pub ac_powered: Option<bool>,
}

/// Call, SMS, hangup, and battery actions over one device backend.
pub struct DeviceAutomation {
    backend: Arc<dyn DeviceBackend>,
    config: AutomationConfig,
}

impl DeviceAutomation {
    /// Automation over `backend`.
    pub fn new(backend: Arc<dyn DeviceBackend>, config: AutomationConfig) -> Self {
        Self { backend, config }
    }

    /// Dials `number` and clears the SIM chooser when it appears.
    ///
    /// The chooser is the ambiguous follow-up state: dialing succeeded but
    /// the call will not proceed until one SIM is picked, so the ranked
    /// fallback walk selects the configured option.
    pub async fn place_call(&self, number: &str) -> Result<CallPlacement, AutomationError> {
        let output = self
            .backend
            .shell(&ShellCommand::Dial {
                number: number.to_string(),
            })
            .await?;
        verify_activity_launch(&output)?;
        tracing::info!(number, "call intent launched");

        tokio::time::sleep(Duration::from_millis(self.config.chooser_grace_ms)).await;

        let dump = self.backend.shell(&ShellCommand::UiDump).await?;
        let snapshot = UiSnapshot::parse(&dump);
        if !self.chooser_present(&snapshot) {
            return Ok(CallPlacement {
                chooser_detected: false,
                sim_selected: None,
            });
        }

        tracing::info!(goal = %self.config.sim_goal_label, "SIM chooser detected");
        let plan = resolve_ambiguity(
            &snapshot,
            &self.config.sim_goal_label,
            self.config.fallback.grid_size,
        );
        let outcome = execute_ordered(
            &*self.backend,
            &self.config.sim_goal_label,
            &plan,
            &self.config.fallback,
        )
        .await?;

        Ok(CallPlacement {
            chooser_detected: true,
            sim_selected: Some(outcome.resolved_by),
        })
    }

    /// Opens the SMS app with a pre-filled message to `number`.
    pub async fn send_sms(&self, number: &str, body: &str) -> Result<(), AutomationError> {
        let output = self
            .backend
            .shell(&ShellCommand::ComposeSms {
                number: number.to_string(),
                body: body.to_string(),
            })
            .await?;
        verify_activity_launch(&output)?;
        tracing::info!(number, "SMS compose launched");
        Ok(())
    }

    /// Ends the current call.
    pub async fn hang_up(&self) -> Result<(), AutomationError> {
        self.backend.shell(&ShellCommand::Hangup).await?;
        Ok(())
    }

    /// Reads the device battery level and charge state.
    pub async fn battery_status(&self) -> Result<BatteryStatus, AutomationError> {
        let output = self.backend.shell(&ShellCommand::BatteryStatus).await?;
        Ok(parse_battery(&output))
    }

    fn chooser_present(&self, snapshot: &UiSnapshot) -> bool {
        self.config
            .chooser_markers
            .iter()
            .any(|marker| snapshot.contains_marker(marker))
    }
}

/// The activity manager echoes `Starting: Intent ...` on success.
fn verify_activity_launch(output: &str) -> Result<(), AutomationError> {
    if output.contains("Starting") || output.contains("Activity") {
        Ok(())
    } else {
        Err(AutomationError::Launch {
            detail: output.trim().to_string(),
        })
    }
}

fn parse_battery(output: &str) -> BatteryStatus {
    let mut status = BatteryStatus::default();
    for line in output.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("level:") {
            status.level = value.trim().parse().ok();
        } else if let Some(value) = line.strip_prefix("AC powered:") {
            status.ac_powered = value.trim().parse().ok();
        }
    }
    status
}
