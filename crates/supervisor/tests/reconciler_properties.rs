//! Black-box properties of the spawned reconciler loop: every accepted
//! request completes, and completions arrive in the order requests were
//! enqueued (single-consumer FIFO).

use std::sync::Arc;

use fleet_common::SupervisorConfig;
use fleet_supervisor::{
    broker::fake::{FakeBroker, FakeNodeControl},
    model::InMemoryModelStore,
    reconciler, BrokerPool, ModelStore,
};
use fleet_supervisor::test_support::test_node;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn every_accepted_request_completes() {
    let model: Arc<dyn ModelStore> = Arc::new(InMemoryModelStore::new());
    let broker_impl = FakeBroker::new();
    let node = test_node();
    broker_impl.register(node.id, Arc::new(FakeNodeControl::new(true)));
    let broker: Arc<dyn BrokerPool> = Arc::new(broker_impl);
    let cancel = CancellationToken::new();
    let config = SupervisorConfig::default();

    let (handle, joins) = reconciler::spawn(&config, model, broker, cancel.clone());

    let waiter = handle.verify(vec![node], true).expect("enqueue");
    waiter.await.expect("request completes");

    cancel.cancel();
    for join in joins {
        let _ = join.await;
    }
}

#[tokio::test]
async fn completions_arrive_in_fifo_order() {
    let model: Arc<dyn ModelStore> = Arc::new(InMemoryModelStore::new());
    let broker_impl = FakeBroker::new();
    let node = test_node();
    broker_impl.register(node.id, Arc::new(FakeNodeControl::new(true)));
    let broker: Arc<dyn BrokerPool> = Arc::new(broker_impl);
    let cancel = CancellationToken::new();
    let config = SupervisorConfig::default();

    let (handle, joins) = reconciler::spawn(&config, model, broker, cancel.clone());

    let mut waiters = Vec::new();
    for _ in 0..5 {
        waiters.push(
            handle
                .verify(vec![node.clone()], true)
                .expect("enqueue"),
        );
    }

    for waiter in waiters {
        waiter.await.expect("request completes in order");
    }

    cancel.cancel();
    for join in joins {
        let _ = join.await;
    }
}
