use std::sync::Mutex;

/// Shared pause flag. Connection errors flip it on; broker revival flips it
/// back off. Guarded by a plain blocking mutex since the critical section
/// never awaits and callers may live on arbitrary tasks (broker callbacks,
/// the public `pause()`/`resume()` API, the reconciler loop itself).
#[derive(Debug, Default)]
pub struct PauseFlag(Mutex<bool>);

impl PauseFlag {
    pub fn new() -> Self {
        Self(Mutex::new(false))
    }

    /// Pauses, and triggers `respond_to_ping` so an external liveness probe
    /// doesn't see a stale timestamp just because the broker is down.
    pub fn pause(&self, respond_to_ping: &(dyn Fn() + Send + Sync)) {
        let mut guard = self.0.lock().unwrap();
        if !*guard {
            tracing::debug!("pausing");
        }
        *guard = true;
        drop(guard);
        respond_to_ping();
    }

    pub fn resume(&self) {
        let mut guard = self.0.lock().unwrap();
        if *guard {
            tracing::debug!("resuming");
        }
        *guard = false;
    }

    pub fn is_paused(&self) -> bool {
        *self.0.lock().unwrap()
    }
}
