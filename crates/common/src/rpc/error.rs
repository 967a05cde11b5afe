use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every disposition-bearing error the reconciliation engine produces.
///
/// Kept as a single flat enum (rather than one per component) so that call
/// sites in the reconciler can match exhaustively on "what do I do about
/// this" instead of threading several error types through `?`.
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
pub enum SupervisorError {
    /// The broker connection could not be established or was dropped
    /// mid-call. Causes the supervisor to pause until the broker revives.
    #[error("broker connection error: {0}")]
    BrokerConnection(String),

    /// The surrounding cancellation token was tripped while `InsuredCall`
    /// was still retrying.
    #[error("broker unavailable: shutting down")]
    BrokerUnavailable,

    /// A node was restarted more often than `restart_max_rate` allows.
    #[error("node restarted too often, disabling")]
    NodeRestartRateExceeded,

    /// A node didn't respond to any ping attempt after being restarted.
    #[error("node does not respond after restart")]
    NodeNoPingAfterRestart,

    /// The node's `stats()` reply had no recognizable autoscaler section.
    #[error("node stats reply has no autoscaler section")]
    ModelShapeError,

    /// The request queue rejected an enqueue because it was full.
    #[error("request queue is full")]
    QueueFull,
}
