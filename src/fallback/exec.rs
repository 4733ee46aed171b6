//! Sequential execution of ranked fallback candidates.

use thiserror::Error;
use tokio::time::Duration;

use crate::{
    device::{DeviceBackend, DeviceError, command::ShellCommand, ui::UiSnapshot},
    fallback::plan::{FallbackAttempt, FallbackConfig},
};

/// Fallback-engine failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FallbackError {
    /// The device itself failed mid-walk; distinct from an unresolved
    /// ambiguity.
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// Every candidate was tried exactly once and the ambiguity remains.
    #[error("ambiguity {goal:?} unresolved after {} candidates", attempted.len())]
    Unresolved {
        /// Goal label the walk tried to act on.
        goal: String,
        /// Every candidate tried, in rank order.
        attempted: Vec<FallbackAttempt>,
    },
}

/// Successful fallback resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackOutcome {
    /// Candidate whose tap cleared the ambiguity.
    pub resolved_by: FallbackAttempt,
    /// Candidates tried, including the successful one.
    pub attempts_tried: usize,
}

/// Taps candidates in rank order until the ambiguity clears.
///
/// After each tap the device state is re-read; the walk stops at the first
/// candidate after which `goal_label` is no longer on screen. Candidates
/// are strictly sequential, each tried exactly once. Exhausting the list is
/// reported as [`FallbackError::Unresolved`], never as success.
pub async fn execute_ordered(
    backend: &dyn DeviceBackend,
    goal_label: &str,
    attempts: &[FallbackAttempt],
    config: &FallbackConfig,
) -> Result<FallbackOutcome, FallbackError> {
    for (tried, attempt) in attempts.iter().enumerate() {
        tracing::debug!(rank = attempt.rank, label = %attempt.label, "trying fallback candidate");
        backend
            .shell(&ShellCommand::Tap {
                x: attempt.point.x,
                y: attempt.point.y,
            })
            .await?;

        tokio::time::sleep(Duration::from_millis(config.settle_ms)).await;

        let dump = backend.shell(&ShellCommand::UiDump).await?;
        let snapshot = UiSnapshot::parse(&dump);
        if !snapshot.has_text(goal_label) {
            return Ok(FallbackOutcome {
                resolved_by: attempt.clone(),
                attempts_tried: tried + 1,
            });
        }
    }

    tracing::warn!(goal = goal_label, candidates = attempts.len(), "fallback exhausted");
    Err(FallbackError::Unresolved {
        goal: goal_label.to_string(),
        attempted: attempts.to_vec(),
    })
}
