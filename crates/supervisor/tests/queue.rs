//! `RequestQueue` behaves as a bounded, non-blocking hand-off: producers
//! never wait, and a full queue is an immediate, typed error.

use fleet_common::SupervisorError;
use fleet_supervisor::queue::{Action, RequestQueue};
use fleet_supervisor::test_support::test_node;

#[tokio::test]
async fn enqueue_succeeds_up_to_capacity_then_reports_queue_full() {
    let (queue, mut rx) = RequestQueue::new(1);
    let node = test_node();

    let first = queue.enqueue(vec![node.clone()], Action::Verify { ratelimit: true });
    assert!(first.is_ok());

    let second = queue.enqueue(vec![node], Action::Verify { ratelimit: true });
    assert!(matches!(second, Err(SupervisorError::QueueFull)));

    // Draining makes room again.
    let request = rx.recv().await.unwrap();
    let _ = request.completion.send(());
    let third = queue.enqueue(vec![test_node()], Action::Shutdown);
    assert!(third.is_ok());
}

#[tokio::test]
async fn completion_is_observed_exactly_once() {
    let (queue, mut rx) = RequestQueue::new(4);
    let waiter = queue
        .enqueue(vec![test_node()], Action::Restart)
        .expect("enqueue");

    let request = rx.recv().await.unwrap();
    request.completion.send(()).expect("receiver still live");

    waiter.await.expect("completion delivered");
}
