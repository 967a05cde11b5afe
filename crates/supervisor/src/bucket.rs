use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use fleet_common::NodeId;

/// Capacity-1 token bucket, refilled at a configurable rate.
///
/// Mirrors the celery `TokenBucket` this supervisor's restart limiter was
/// originally built on: tokens accrue continuously (not in discrete steps)
/// based on wall-clock elapsed time since the last check, which avoids
/// having to run a background refill task.
#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    rate_per_sec: f64,
    last_check: Instant,
}

impl TokenBucket {
    fn new(refill: Duration) -> Self {
        let rate_per_sec = 1.0 / refill.as_secs_f64().max(f64::MIN_POSITIVE);
        Self {
            capacity: 1.0,
            tokens: 1.0,
            rate_per_sec,
            last_check: Instant::now(),
        }
    }

    fn try_consume(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_check).as_secs_f64();
        self.last_check = now;
        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-node restart rate limiters, keyed by node identity.
///
/// Accessed only from the reconciler task, so no internal locking is
/// needed — the map is a plain [`HashMap`], not a concurrent one.
#[derive(Debug, Default)]
pub struct TokenBucketRegistry {
    buckets: HashMap<NodeId, TokenBucket>,
    refill: Duration,
}

impl TokenBucketRegistry {
    pub fn new(refill: Duration) -> Self {
        Self {
            buckets: HashMap::new(),
            refill,
        }
    }

    /// Attempts to consume a restart token for `node`, creating its bucket
    /// on first use.
    pub fn try_consume(&mut self, node: NodeId) -> bool {
        self.buckets
            .entry(node)
            .or_insert_with(|| TokenBucket::new(self.refill))
            .try_consume()
    }

    /// Evicts the bucket for `node`, e.g. after the node was disabled or
    /// after an unrate-limited restart.
    pub fn forget(&mut self, node: NodeId) {
        self.buckets.remove(&node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_restart_always_succeeds() {
        let mut reg = TokenBucketRegistry::new(Duration::from_secs(60));
        let id = NodeId::new();
        assert!(reg.try_consume(id));
    }

    #[test]
    fn second_restart_within_window_is_denied() {
        let mut reg = TokenBucketRegistry::new(Duration::from_secs(60));
        let id = NodeId::new();
        assert!(reg.try_consume(id));
        assert!(!reg.try_consume(id));
    }

    #[test]
    fn forget_resets_the_bucket() {
        let mut reg = TokenBucketRegistry::new(Duration::from_secs(60));
        let id = NodeId::new();
        assert!(reg.try_consume(id));
        reg.forget(id);
        assert!(reg.try_consume(id));
    }
}
