//! The broker transport boundary.
//!
//! Everything in this module is an interface: [`BrokerPool`] is what
//! `InsuredCall` acquires connections from, and [`NodeControl`] (defined in
//! `fleet-common`) is the capability it invokes once connected. A real
//! deployment backs these with an actual broker client; [`fake::FakeBroker`]
//! is a scriptable in-memory stand-in used by this crate's own test suite
//! and by `fleet-supervisor`'s standalone/demo mode.

use std::sync::Arc;

use fleet_common::{Node, SupervisorError};

#[async_trait::async_trait]
pub trait BrokerPool: Send + Sync {
    /// Acquires a control handle for `node`, ensuring the underlying
    /// connection is usable. Implementations are expected to retry
    /// internally up to some bounded interval and return
    /// [`SupervisorError::BrokerConnection`] on failure — `InsuredCall`
    /// treats that as "the broker is down" and retries the whole call.
    async fn connect(&self, node: &Node) -> Result<Arc<dyn fleet_common::NodeControl>, SupervisorError>;
}

pub mod fake {
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicBool, AtomicU32, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use fleet_common::rpc::control::{NodeStats, QueueInfo};
    use fleet_common::{Node, NodeControl, NodeId, SupervisorError};

    use super::*;

    /// Scriptable stand-in for a single node's broker capability.
    ///
    /// Every call is recorded so tests can assert on exactly which
    /// broadcast commands the reconciler issued.
    #[derive(Debug, Default)]
    pub struct FakeNodeControl {
        pub alive: AtomicBool,
        pub ping_fails_until: AtomicU32,
        pub ping_attempts: AtomicU32,
        pub restart_count: AtomicU32,
        pub stop_count: AtomicU32,
        pub consuming_from: Mutex<Option<HashMap<String, QueueInfo>>>,
        pub stats: Mutex<NodeStats>,
        pub added_queues: Mutex<Vec<String>>,
        pub cancelled_queues: Mutex<Vec<String>>,
        pub autoscale_calls: Mutex<Vec<(u32, u32)>>,
    }

    impl FakeNodeControl {
        pub fn new(alive: bool) -> Self {
            Self {
                alive: AtomicBool::new(alive),
                ..Default::default()
            }
        }

        pub fn set_consuming_from(&self, queues: impl IntoIterator<Item = String>) {
            *self.consuming_from.lock().unwrap() = Some(
                queues
                    .into_iter()
                    .map(|q| (q, QueueInfo::default()))
                    .collect(),
            );
        }

        pub fn set_autoscaler(&self, min: u32, max: u32) {
            self.stats.lock().unwrap().autoscaler =
                Some(fleet_common::state::AutoscalerStats { min, max });
        }
    }

    #[async_trait]
    impl NodeControl for FakeNodeControl {
        async fn alive(&self) -> Result<bool, SupervisorError> {
            Ok(self.alive.load(Ordering::SeqCst))
        }

        async fn restart(&self) -> Result<(), SupervisorError> {
            self.restart_count.fetch_add(1, Ordering::SeqCst);
            self.alive.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> Result<(), SupervisorError> {
            self.stop_count.fetch_add(1, Ordering::SeqCst);
            self.alive.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn responds_to_ping(&self, _timeout: Duration) -> Result<bool, SupervisorError> {
            let attempt = self.ping_attempts.fetch_add(1, Ordering::SeqCst);
            Ok(attempt >= self.ping_fails_until.load(Ordering::SeqCst))
        }

        async fn consuming_from(
            &self,
        ) -> Result<Option<HashMap<String, QueueInfo>>, SupervisorError> {
            Ok(self.consuming_from.lock().unwrap().clone())
        }

        async fn add_queue(&self, name: &str) -> Result<(), SupervisorError> {
            self.added_queues.lock().unwrap().push(name.to_string());
            let mut guard = self.consuming_from.lock().unwrap();
            guard
                .get_or_insert_with(HashMap::new)
                .insert(name.to_string(), QueueInfo::default());
            Ok(())
        }

        async fn cancel_queue(&self, name: &str) -> Result<(), SupervisorError> {
            self.cancelled_queues.lock().unwrap().push(name.to_string());
            if let Some(map) = self.consuming_from.lock().unwrap().as_mut() {
                map.remove(name);
            }
            Ok(())
        }

        async fn stats(&self) -> Result<NodeStats, SupervisorError> {
            Ok(self.stats.lock().unwrap().clone())
        }

        async fn autoscale(&self, max: u32, min: u32) -> Result<(), SupervisorError> {
            self.autoscale_calls.lock().unwrap().push((max, min));
            let mut stats = self.stats.lock().unwrap();
            stats.autoscaler = Some(fleet_common::state::AutoscalerStats { min, max });
            Ok(())
        }
    }

    /// In-memory broker pool that hands back pre-registered
    /// [`FakeNodeControl`] handles, optionally simulating a run of
    /// connection failures before it starts succeeding.
    #[derive(Debug, Default)]
    pub struct FakeBroker {
        nodes: Mutex<HashMap<NodeId, Arc<FakeNodeControl>>>,
        fail_connects_remaining: AtomicU32,
    }

    impl FakeBroker {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn register(&self, id: NodeId, control: Arc<FakeNodeControl>) {
            self.nodes.lock().unwrap().insert(id, control);
        }

        pub fn control(&self, id: NodeId) -> Option<Arc<FakeNodeControl>> {
            self.nodes.lock().unwrap().get(&id).cloned()
        }

        /// Causes the next `n` calls to [`BrokerPool::connect`] to fail with
        /// `BrokerConnection`, simulating a broker flap.
        pub fn fail_next_connects(&self, n: u32) {
            self.fail_connects_remaining.store(n, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl BrokerPool for FakeBroker {
        async fn connect(&self, node: &Node) -> Result<Arc<dyn NodeControl>, SupervisorError> {
            let mut remaining = self.fail_connects_remaining.load(Ordering::SeqCst);
            while remaining > 0 {
                if self
                    .fail_connects_remaining
                    .compare_exchange(
                        remaining,
                        remaining - 1,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .is_ok()
                {
                    return Err(SupervisorError::BrokerConnection(
                        "simulated broker flap".into(),
                    ));
                }
                remaining = self.fail_connects_remaining.load(Ordering::SeqCst);
            }

            self.control(node.id)
                .map(|c| c as Arc<dyn NodeControl>)
                .ok_or_else(|| SupervisorError::BrokerConnection(format!("no such node {}", node.id)))
        }
    }
}
