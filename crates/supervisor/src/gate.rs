use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

/// Tracks broker liveness and decides whether restarts are currently safe.
///
/// Workers cannot respond to broadcast commands while the broker is
/// offline, so the supervisor withholds restarts for
/// [`wait_after_broker_revived`](Self::new) after the broker comes back,
/// giving nodes a chance to reconnect on their own.
#[derive(Debug)]
pub struct BrokerGate {
    last_revived: Mutex<Option<Instant>>,
    wait_after_broker_revived: Duration,
}

impl BrokerGate {
    pub fn new(wait_after_broker_revived: Duration) -> Self {
        Self {
            last_revived: Mutex::new(None),
            wait_after_broker_revived,
        }
    }

    /// Records that the broker connection came back up.
    pub fn on_revive(&self) {
        *self.last_revived.lock().unwrap() = Some(Instant::now());
    }

    /// True iff the broker has never flapped, or the cool-down since its
    /// last revival has elapsed.
    pub fn may_restart(&self) -> bool {
        match *self.last_revived.lock().unwrap() {
            None => true,
            Some(t) => t.elapsed() > self.wait_after_broker_revived,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_restart_before_any_revival() {
        let gate = BrokerGate::new(Duration::from_secs(35));
        assert!(gate.may_restart());
    }

    #[test]
    fn withholds_restart_during_cooldown() {
        let gate = BrokerGate::new(Duration::from_secs(35));
        gate.on_revive();
        assert!(!gate.may_restart());
    }

    #[test]
    fn allows_restart_after_cooldown_elapses() {
        let gate = BrokerGate::new(Duration::from_millis(10));
        gate.on_revive();
        std::thread::sleep(Duration::from_millis(20));
        assert!(gate.may_restart());
    }
}
