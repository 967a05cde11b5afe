//! The `InsuredCall` combinator: wraps a single broadcast RPC against a
//! node with connection-revive retry and pause-on-error, per §4.3.

use std::{future::Future, sync::Arc, time::Duration};

use fleet_common::{Node, NodeControl, SupervisorError};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{broker::BrokerPool, gate::BrokerGate, pause::PauseFlag};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Runs `op` against `node`'s broker connection, retrying on connection
/// failure with exponential backoff capped at 30s. Pauses the supervisor
/// for the duration of any outage and resumes (and notifies the broker
/// gate) the moment a connection succeeds again.
///
/// Returns `Err(BrokerUnavailable)` only if `cancel` is tripped while
/// retrying; any other error from `op` is returned immediately without
/// being treated as a connection failure.
pub async fn insured<F, Fut, T>(
    node: &Node,
    broker: &dyn BrokerPool,
    pause: &PauseFlag,
    gate: &BrokerGate,
    cancel: &CancellationToken,
    respond_to_ping: &(dyn Fn() + Send + Sync),
    op: F,
) -> Result<T, SupervisorError>
where
    F: Fn(Arc<dyn NodeControl>) -> Fut,
    Fut: Future<Output = Result<T, SupervisorError>>,
{
    let mut backoff = INITIAL_BACKOFF;
    let mut recovering = false;

    loop {
        if cancel.is_cancelled() {
            return Err(SupervisorError::BrokerUnavailable);
        }

        let control = match broker.connect(node).await {
            Ok(control) => control,
            Err(err) => {
                error!(%node, error = %err, "error while trying to broadcast, pausing");
                pause.pause(respond_to_ping);
                recovering = true;
                if wait_or_cancel(cancel, backoff).await.is_err() {
                    return Err(SupervisorError::BrokerUnavailable);
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }
        };

        if recovering {
            gate.on_revive();
            pause.resume();
            recovering = false;
            backoff = INITIAL_BACKOFF;
        }

        match op(control).await {
            Ok(value) => return Ok(value),
            Err(SupervisorError::BrokerConnection(msg)) => {
                error!(%node, error = %msg, "error while trying to broadcast, pausing");
                pause.pause(respond_to_ping);
                recovering = true;
                if wait_or_cancel(cancel, backoff).await.is_err() {
                    return Err(SupervisorError::BrokerUnavailable);
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            Err(other) => return Err(other),
        }
    }
}

async fn wait_or_cancel(cancel: &CancellationToken, dur: Duration) -> Result<(), ()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(()),
        _ = sleep(dur) => Ok(()),
    }
}
