//! The model store boundary.
//!
//! [`ModelStore`] is the only interface the reconciliation engine needs
//! from persistence: list the declared nodes, disable one on runaway
//! restart, and publish change notifications. [`InMemoryModelStore`] is a
//! fully functional reference implementation used by this crate's test
//! suite and by `fleet-supervisor`'s standalone mode; a production
//! deployment backs `ModelStore` with its own database.

use std::{
    collections::HashMap,
    sync::Mutex,
};

use fleet_common::{ModelChange, Node, NodeId};
use tokio::sync::broadcast;

#[async_trait::async_trait]
pub trait ModelStore: Send + Sync {
    async fn list_nodes(&self) -> Vec<Node>;

    async fn disable(&self, id: NodeId);

    /// A fresh subscription to change notifications. Each subscriber gets
    /// its own queue of changes made from this point forward.
    fn subscribe(&self) -> broadcast::Receiver<ModelChange>;
}

#[derive(Debug)]
pub struct InMemoryModelStore {
    nodes: Mutex<HashMap<NodeId, Node>>,
    changes: broadcast::Sender<ModelChange>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        let (changes, _rx) = broadcast::channel(256);
        Self {
            nodes: Mutex::new(HashMap::new()),
            changes,
        }
    }

    pub fn with_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let store = Self::new();
        for node in nodes {
            store.nodes.lock().unwrap().insert(node.id, node);
        }
        store
    }

    /// Inserts or replaces a node, publishing `Created` or `Updated`
    /// depending on whether it already existed.
    pub fn upsert(&self, node: Node) {
        let existed = {
            let mut guard = self.nodes.lock().unwrap();
            guard.insert(node.id, node.clone()).is_some()
        };
        let change = if existed {
            ModelChange::Updated(node)
        } else {
            ModelChange::Created(node)
        };
        // No subscribers is a normal, not an error: nothing is listening yet.
        let _ = self.changes.send(change);
    }

    pub fn remove(&self, id: NodeId) {
        let removed = self.nodes.lock().unwrap().remove(&id);
        if let Some(node) = removed {
            let _ = self.changes.send(ModelChange::Deleted(node));
        }
    }
}

impl Default for InMemoryModelStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ModelStore for InMemoryModelStore {
    async fn list_nodes(&self) -> Vec<Node> {
        self.nodes.lock().unwrap().values().cloned().collect()
    }

    async fn disable(&self, id: NodeId) {
        if let Some(node) = self.nodes.lock().unwrap().get_mut(&id) {
            node.enabled = false;
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ModelChange> {
        self.changes.subscribe()
    }
}
