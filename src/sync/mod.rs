//! Optimistic synchronization engine.

/// Runtime event stream payloads.
pub mod events;
/// Single-writer engine runtime and handle.
pub mod handle;
/// Explicit mutation queue owned by the engine.
pub mod queue;
