use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the reconciliation engine, per §6 of the design.
///
/// Every field here has a sensible default; the binary entry point layers
/// CLI flags / `FLEET_*` environment variables on top of these via `clap`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Verify-all period.
    pub interval: Duration,

    /// Restart token bucket refill period (capacity is always 1).
    pub restart_refill: Duration,

    /// Post broker-revival cool-down before rate-limited restarts resume.
    pub wait_after_broker_revived: Duration,

    /// Bound on pending requests in the hand-off queue.
    pub queue_capacity: usize,

    /// Emit the "wake-up" debug log at most once per this many dequeues.
    pub wakeup_log_throttle: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            restart_refill: Duration::from_secs(60),
            wait_after_broker_revived: Duration::from_secs(35),
            queue_capacity: 1024,
            wakeup_log_throttle: 30,
        }
    }
}
