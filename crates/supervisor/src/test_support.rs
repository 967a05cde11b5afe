//! Fixtures shared between this crate's unit tests and the integration
//! tests in `tests/`. Not behind `#[cfg(test)]` because integration tests
//! live in a separate crate and need to reach it as ordinary library code.

use std::collections::HashSet;

use fleet_common::Node;

pub fn test_node() -> Node {
    Node {
        id: Default::default(),
        name: "worker-0".into(),
        enabled: true,
        persisted: true,
        queues: HashSet::new(),
        direct_queue: "worker-0.direct".into(),
        min_concurrency: 1,
        max_concurrency: 4,
    }
}

pub fn test_node_with_queues(queues: impl IntoIterator<Item = &'static str>) -> Node {
    Node {
        queues: queues.into_iter().map(String::from).collect(),
        ..test_node()
    }
}
