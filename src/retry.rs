//! Shared exponential backoff policy.

use tokio::time::Duration;

/// Capped exponential backoff: `min(base * 2^n, cap)`.
///
/// Pure and stateless; each component carries its own base/cap. Poll loops
/// run on fixed intervals and do not use this policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// First-retry delay in milliseconds.
    pub base_ms: u64,
    /// Upper bound on any single delay in milliseconds.
    pub cap_ms: u64,
}

impl RetryPolicy {
    /// Default policy for remote commit retries.
    pub const COMMIT: Self = Self {
        base_ms: 1_000,
        cap_ms: 30_000,
    };

    /// Default policy for HTTP transport-level retries.
    pub const TRANSPORT: Self = Self {
        base_ms: 300,
        cap_ms: 2_000,
    };

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let ms = self.base_ms.saturating_mul(factor).min(self.cap_ms);
        Duration::from_millis(ms)
    }
}
