//! The bounded hand-off queue between producers (the periodic timer, model
//! change notifications, explicit API calls) and the reconciler loop. See
//! §4.4.

use fleet_common::{Node, SupervisorError};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Verify { ratelimit: bool },
    Restart,
    Shutdown,
}

pub struct Request {
    pub nodes: Vec<Node>,
    pub action: Action,
    pub completion: oneshot::Sender<()>,
}

/// Producer-facing handle. Enqueueing never blocks: a full queue is an
/// operator-visible error rather than backpressure on the caller, since a
/// caller may itself be a database change-notification handler that must
/// not block.
#[derive(Clone)]
pub struct RequestQueue {
    tx: mpsc::Sender<Request>,
}

impl RequestQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Request>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn enqueue(
        &self,
        nodes: Vec<Node>,
        action: Action,
    ) -> Result<oneshot::Receiver<()>, SupervisorError> {
        let (completion, waiter) = oneshot::channel();
        let request = Request {
            nodes,
            action,
            completion,
        };
        // try_send's two failure modes (full vs. the reconciler having shut
        // down) both surface as the same operator-visible error: either
        // way, the request was not accepted.
        self.tx
            .try_send(request)
            .map_err(|_| SupervisorError::QueueFull)?;
        Ok(waiter)
    }
}
