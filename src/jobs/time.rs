//! Monotonic clock helpers.
//!
//! The scheduler deals exclusively in monotonic milliseconds since an
//! arbitrary process-local epoch — never a wall clock — so that delayed
//! jobs are immune to system clock adjustments.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

fn epoch() -> Instant {
    *EPOCH.get_or_init(Instant::now)
}

/// Current monotonic time in milliseconds since the process-local epoch.
pub fn now_ms() -> u64 {
    epoch().elapsed().as_millis() as u64
}

/// Convert a monotonic-ms timestamp back into a [`tokio::time::Instant`],
/// for arming a timer.
pub fn to_tokio_instant(run_at_ms: u64) -> tokio::time::Instant {
    let target = epoch() + std::time::Duration::from_millis(run_at_ms);
    tokio::time::Instant::from_std(target)
}
