use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::NodeId;

/// Declared state of a worker node, as recorded in the model store.
///
/// The supervisor treats this as read-mostly: the only mutation it ever
/// performs is [`Node::disable`], and even that is expected to be proxied
/// through a `ModelStore` so it's persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,

    /// Disabled nodes should be stopped, not restarted.
    pub enabled: bool,

    /// Mirrors Django's `pk is not None`: false for a node value that has
    /// not (yet) been committed to the model store. `ModelStore::list_nodes`
    /// never returns one of these; it exists for parity with the verify
    /// logic's defensive check.
    pub persisted: bool,

    /// Declared set of queue names the node must consume from.
    pub queues: HashSet<String>,

    /// Reserved queue name that must never be cancelled.
    pub direct_queue: String,

    pub min_concurrency: u32,
    pub max_concurrency: u32,
}

impl Node {
    pub fn is_live(&self) -> bool {
        self.enabled && self.persisted
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.id)
    }
}

/// Autoscaler bounds as reported by a live node's `stats()` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoscalerStats {
    pub min: u32,
    pub max: u32,
}
