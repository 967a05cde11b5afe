use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::rpc::error::SupervisorError;
use crate::state::AutoscalerStats;

/// The broadcast capability the supervisor invokes against a single node
/// over the broker's control-plane.
///
/// A real deployment implements this as a thin wrapper around a broker
/// broadcast call (AMQP RPC, a Kafka request/reply topic, ...); the wire
/// format is deliberately left to that implementation. Every method can
/// fail with [`SupervisorError::BrokerConnection`], which is how
/// `InsuredCall` learns to pause and retry.
#[async_trait::async_trait]
pub trait NodeControl: Send + Sync {
    /// Whether the node currently responds to liveness checks.
    async fn alive(&self) -> Result<bool, SupervisorError>;

    /// Ask the node to restart its executor process.
    async fn restart(&self) -> Result<(), SupervisorError>;

    /// Ask the node to stop consuming entirely.
    async fn stop(&self) -> Result<(), SupervisorError>;

    /// Liveness probe with an explicit timeout, used during post-restart
    /// verification.
    async fn responds_to_ping(&self, timeout: Duration) -> Result<bool, SupervisorError>;

    /// The queues the node currently believes it is consuming from, keyed
    /// by queue name. `None` means the node gave no reply at all (distinct
    /// from replying with an empty map).
    async fn consuming_from(&self) -> Result<Option<HashMap<String, QueueInfo>>, SupervisorError>;

    async fn add_queue(&self, name: &str) -> Result<(), SupervisorError>;

    async fn cancel_queue(&self, name: &str) -> Result<(), SupervisorError>;

    /// Node-reported runtime stats. `autoscaler` is absent if the node's
    /// executor hasn't reported in yet.
    async fn stats(&self) -> Result<NodeStats, SupervisorError>;

    async fn autoscale(&self, max: u32, min: u32) -> Result<(), SupervisorError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueInfo {
    pub consumer_tag: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeStats {
    pub autoscaler: Option<AutoscalerStats>,
}
