//! Ranked-candidate fallback against an ambiguous device UI state.

/// Sequential candidate executor.
pub mod exec;
/// Candidate generation from a UI snapshot.
pub mod plan;

pub use exec::{FallbackError, FallbackOutcome, execute_ordered};
pub use plan::{FallbackAttempt, FallbackConfig, resolve_ambiguity};
