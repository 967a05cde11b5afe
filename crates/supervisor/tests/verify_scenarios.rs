//! End-to-end scenarios for the three reconciliation procedures, run
//! directly against `VerifyContext` so each scenario can assert on the
//! exact broker commands issued without any real-time dependency.

use std::{sync::Arc, time::Duration};

use fleet_supervisor::{
    broker::fake::{FakeBroker, FakeNodeControl},
    bucket::TokenBucketRegistry,
    gate::BrokerGate,
    model::InMemoryModelStore,
    pause::PauseFlag,
    test_support::{test_node, test_node_with_queues},
    verify::{restart_node, stop_node, verify_node, VerifyContext},
};
use tokio_util::sync::CancellationToken;

struct Harness {
    broker: FakeBroker,
    model: InMemoryModelStore,
    pause: PauseFlag,
    gate: BrokerGate,
    buckets: TokenBucketRegistry,
    cancel: CancellationToken,
}

impl Harness {
    fn new() -> Self {
        Self {
            broker: FakeBroker::new(),
            model: InMemoryModelStore::new(),
            pause: PauseFlag::new(),
            gate: BrokerGate::new(Duration::from_secs(35)),
            buckets: TokenBucketRegistry::new(Duration::from_secs(60)),
            cancel: CancellationToken::new(),
        }
    }

    fn ctx(&mut self) -> VerifyContext<'_> {
        VerifyContext {
            broker: &self.broker,
            model: &self.model,
            pause: &self.pause,
            gate: &self.gate,
            cancel: &self.cancel,
            respond_to_ping: &|| {},
            buckets: &mut self.buckets,
        }
    }
}

// S1: a queue declared on the node but not observed on the broker side gets
// added.
#[tokio::test]
async fn s1_add_declared_queue() {
    let mut harness = Harness::new();
    let node = test_node_with_queues(["orders"]);
    let control = Arc::new(FakeNodeControl::new(true));
    control.set_consuming_from([]);
    harness.broker.register(node.id, control.clone());

    let mut ctx = harness.ctx();
    verify_node(&mut ctx, &node, true).await.unwrap();

    assert_eq!(control.added_queues.lock().unwrap().as_slice(), ["orders"]);
    assert!(control.cancelled_queues.lock().unwrap().is_empty());
}

// S2: an extra queue the node is consuming from but that isn't declared
// gets cancelled; the direct queue never does, even if it's "extra".
#[tokio::test]
async fn s2_remove_extra_queue_preserve_direct() {
    let mut harness = Harness::new();
    let node = test_node_with_queues(["orders"]);
    let control = Arc::new(FakeNodeControl::new(true));
    control.set_consuming_from(["orders".to_string(), "stale".to_string(), node.direct_queue.clone()]);
    harness.broker.register(node.id, control.clone());

    let mut ctx = harness.ctx();
    verify_node(&mut ctx, &node, true).await.unwrap();

    assert_eq!(control.cancelled_queues.lock().unwrap().as_slice(), ["stale"]);
    assert!(control.added_queues.lock().unwrap().is_empty());
}

// S3: a live node whose reported autoscale bounds differ from its declared
// ones gets corrected, and a second immediate run is a no-op (idempotent).
#[tokio::test]
async fn s3_autoscale_drift_then_idempotent() {
    let mut harness = Harness::new();
    let node = test_node();
    let control = Arc::new(FakeNodeControl::new(true));
    control.set_consuming_from([]);
    control.set_autoscaler(1, 2);
    harness.broker.register(node.id, control.clone());

    let mut ctx = harness.ctx();
    verify_node(&mut ctx, &node, true).await.unwrap();
    assert_eq!(
        control.autoscale_calls.lock().unwrap().as_slice(),
        [(node.max_concurrency, node.min_concurrency)]
    );

    verify_node(&mut ctx, &node, true).await.unwrap();
    assert_eq!(control.autoscale_calls.lock().unwrap().len(), 1);
}

// S4: a node that keeps failing liveness exhausts its restart token bucket
// and is disabled rather than restarted indefinitely.
#[tokio::test]
async fn s4_rate_limited_runaway_disables_node() {
    let mut harness = Harness::new();
    let node = test_node();
    let control = Arc::new(FakeNodeControl::new(false));
    harness.broker.register(node.id, control.clone());
    harness.model.upsert(node.clone());

    let mut ctx = harness.ctx();
    // First restart attempt consumes the only token and succeeds.
    verify_node(&mut ctx, &node, true).await.unwrap();
    assert_eq!(control.restart_count.load(std::sync::atomic::Ordering::SeqCst), 1);

    // The node goes right back to reporting dead; the bucket is now empty,
    // so this cycle disables it instead of restarting again.
    control.alive.store(false, std::sync::atomic::Ordering::SeqCst);
    restart_node(&mut ctx, &node, true).await.unwrap();
    assert_eq!(control.restart_count.load(std::sync::atomic::Ordering::SeqCst), 1);

    let nodes = harness.model.list_nodes().await;
    assert!(!nodes.iter().find(|n| n.id == node.id).unwrap().enabled);
}

// S5: a broker connection flap pauses the supervisor and withholds
// restarts until the post-revival cool-down elapses.
#[tokio::test]
async fn s5_broker_flap_pauses_and_gates_restarts() {
    let mut harness = Harness::new();
    let node = test_node();
    let control = Arc::new(FakeNodeControl::new(false));
    harness.broker.register(node.id, control.clone());
    harness.broker.fail_next_connects(2);

    let mut ctx = harness.ctx();
    restart_node(&mut ctx, &node, true).await.unwrap();

    // The gate was revived during the retry, so it's now in cool-down.
    assert!(!harness.gate.may_restart());
    assert!(!harness.pause.is_paused());
}

// S6: a disabled node that's still reported alive gets stopped, not
// restarted or reconciled further.
#[tokio::test]
async fn s6_disabled_node_still_running_is_stopped() {
    let mut harness = Harness::new();
    let mut node = test_node();
    node.enabled = false;
    let control = Arc::new(FakeNodeControl::new(true));
    harness.broker.register(node.id, control.clone());

    let mut ctx = harness.ctx();
    verify_node(&mut ctx, &node, true).await.unwrap();

    assert_eq!(control.stop_count.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(control.restart_count.load(std::sync::atomic::Ordering::SeqCst), 0);
}

// Pausing short-circuits verify_node entirely, regardless of node state.
#[tokio::test]
async fn paused_verify_is_a_no_op() {
    let mut harness = Harness::new();
    let node = test_node();
    let control = Arc::new(FakeNodeControl::new(false));
    harness.broker.register(node.id, control.clone());
    harness.pause.pause(&|| {});

    let mut ctx = harness.ctx();
    verify_node(&mut ctx, &node, true).await.unwrap();

    assert_eq!(control.restart_count.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stop_node_issues_a_single_stop_call() {
    let mut harness = Harness::new();
    let node = test_node();
    let control = Arc::new(FakeNodeControl::new(true));
    harness.broker.register(node.id, control.clone());

    let mut ctx = harness.ctx();
    stop_node(&mut ctx, &node).await.unwrap();

    assert_eq!(control.stop_count.load(std::sync::atomic::Ordering::SeqCst), 1);
}
