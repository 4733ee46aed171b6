//! Call-state reconciliation across independent detection sources.

/// Poll loop and pure resolution.
pub mod reconciler;
/// Signal and merged-status types.
pub mod signal;
/// Detection-source trait and debug-bridge implementations.
pub mod sources;
