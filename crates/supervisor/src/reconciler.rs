//! The main loop: dequeue, act, signal completion. See §4.5.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use fleet_common::{ModelChange, Node, SupervisorConfig};
use tokio::{sync::oneshot, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    broker::BrokerPool,
    bucket::TokenBucketRegistry,
    gate::BrokerGate,
    model::ModelStore,
    pause::PauseFlag,
    queue::{Action, Request, RequestQueue},
    verify::{restart_node, stop_node, verify_node, VerifyContext},
};

/// Tracks the last time an external liveness probe was acknowledged, so a
/// health endpoint (wired up by the binary entry point) can answer "is the
/// reconciler alive" even while it's paused or backed up.
#[derive(Debug)]
struct PingResponder(Mutex<Instant>);

impl PingResponder {
    fn new() -> Self {
        Self(Mutex::new(Instant::now()))
    }

    fn respond(&self) {
        *self.0.lock().unwrap() = Instant::now();
    }

    #[allow(dead_code)]
    fn last_response(&self) -> Instant {
        *self.0.lock().unwrap()
    }
}

/// Producer-facing handle to a running reconciler. Cloning is cheap; every
/// clone shares the same request queue and pause flag.
#[derive(Clone)]
pub struct SupervisorHandle {
    queue: RequestQueue,
    pause: Arc<PauseFlag>,
    ping: Arc<PingResponder>,
}

impl SupervisorHandle {
    pub fn verify(
        &self,
        nodes: Vec<Node>,
        ratelimit: bool,
    ) -> Result<oneshot::Receiver<()>, fleet_common::SupervisorError> {
        self.queue.enqueue(nodes, Action::Verify { ratelimit })
    }

    /// Always bypasses the restart rate limiter: this is operator intent,
    /// not a reconciliation-driven restart.
    pub fn restart(
        &self,
        nodes: Vec<Node>,
    ) -> Result<oneshot::Receiver<()>, fleet_common::SupervisorError> {
        self.queue.enqueue(nodes, Action::Restart)
    }

    pub fn shutdown(
        &self,
        nodes: Vec<Node>,
    ) -> Result<oneshot::Receiver<()>, fleet_common::SupervisorError> {
        self.queue.enqueue(nodes, Action::Shutdown)
    }

    pub fn pause(&self) {
        self.pause.pause(&|| self.ping.respond());
    }

    pub fn resume(&self) {
        self.pause.resume();
    }
}

/// Owns the request queue's receiving end and all reconciliation state.
/// Constructed only by [`spawn`]; there is no global singleton.
pub struct Reconciler {
    rx: tokio::sync::mpsc::Receiver<Request>,
    broker: Arc<dyn BrokerPool>,
    model: Arc<dyn ModelStore>,
    pause: Arc<PauseFlag>,
    gate: Arc<BrokerGate>,
    buckets: TokenBucketRegistry,
    cancel: CancellationToken,
    ping: Arc<PingResponder>,
    wakeup_throttle: u32,
    wakeup_count: u32,
}

impl Reconciler {
    pub async fn run(mut self) {
        info!("reconciler started");

        loop {
            tokio::select! {
                biased;

                maybe_request = self.rx.recv() => {
                    match maybe_request {
                        Some(request) => self.handle_request(request).await,
                        None => break,
                    }
                }

                _ = tokio::time::sleep(Duration::from_secs(1)) => {
                    self.ping.respond();
                    if self.cancel.is_cancelled() && self.rx.is_empty() {
                        break;
                    }
                }
            }
        }

        info!("reconciler stopped");
    }

    async fn handle_request(&mut self, request: Request) {
        let Request {
            nodes,
            action,
            completion,
        } = request;

        self.ping.respond();
        self.wakeup_count += 1;
        if self.wakeup_count % self.wakeup_throttle.max(1) == 1 {
            debug!(action = ?action, node_count = nodes.len(), "reconciler woke up");
        }

        for node in &nodes {
            let mut ctx = VerifyContext {
                broker: self.broker.as_ref(),
                model: self.model.as_ref(),
                pause: self.pause.as_ref(),
                gate: self.gate.as_ref(),
                cancel: &self.cancel,
                respond_to_ping: &|| self.ping.respond(),
                buckets: &mut self.buckets,
            };

            let result = match action {
                Action::Verify { ratelimit } => verify_node(&mut ctx, node, ratelimit).await,
                Action::Restart => restart_node(&mut ctx, node, false).await,
                Action::Shutdown => stop_node(&mut ctx, node).await,
            };

            if let Err(err) = result {
                warn!(%node, error = %err, "node action failed");
            }
        }

        // Signalled exactly once, on every exit path: the loop above
        // cannot return early, so simply falling through here is enough.
        let _ = completion.send(());
    }
}

/// Spawns the reconciler loop plus its two auxiliary tasks (periodic
/// verify-all, model change forwarding) and returns a handle plus their
/// join handles. Dropping every [`SupervisorHandle`] clone and the
/// returned join handles without awaiting them leaves the tasks running;
/// callers should trip the `cancel` token and await the returned handles
/// to shut down cleanly.
pub fn spawn(
    config: &SupervisorConfig,
    model: Arc<dyn ModelStore>,
    broker: Arc<dyn BrokerPool>,
    cancel: CancellationToken,
) -> (SupervisorHandle, Vec<JoinHandle<()>>) {
    let (queue, rx) = RequestQueue::new(config.queue_capacity);
    let pause = Arc::new(PauseFlag::new());
    let gate = Arc::new(BrokerGate::new(config.wait_after_broker_revived));
    let ping = Arc::new(PingResponder::new());

    let handle = SupervisorHandle {
        queue,
        pause: pause.clone(),
        ping: ping.clone(),
    };

    let reconciler = Reconciler {
        rx,
        broker,
        model: model.clone(),
        pause,
        gate,
        buckets: TokenBucketRegistry::new(config.restart_refill),
        cancel: cancel.clone(),
        ping,
        wakeup_throttle: config.wakeup_log_throttle,
        wakeup_count: 0,
    };

    let mut joins = Vec::with_capacity(3);
    joins.push(tokio::spawn(reconciler.run()));
    joins.push(tokio::spawn(periodic_verify_all(
        handle.clone(),
        model.clone(),
        config.interval,
        cancel.clone(),
    )));
    joins.push(tokio::spawn(forward_model_changes(
        handle.clone(),
        model,
        cancel,
    )));

    (handle, joins)
}

/// Enqueues a verify-all at most once per `interval`, never stacking a new
/// cycle on top of one still in flight. See §4.5.
async fn periodic_verify_all(
    handle: SupervisorHandle,
    model: Arc<dyn ModelStore>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut last_verify_all: Option<oneshot::Receiver<()>> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let still_running = match last_verify_all.as_mut() {
            Some(rx) => matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Empty)),
            None => false,
        };
        if still_running {
            continue;
        }

        let nodes = model.list_nodes().await;
        match handle.verify(nodes, true) {
            Ok(rx) => last_verify_all = Some(rx),
            Err(err) => warn!(error = %err, "periodic verify-all could not be enqueued"),
        }
    }
}

/// Subscribes to model change notifications and translates them into
/// supervisor requests, per §6: created/updated nodes are verified
/// (unrate-limited — a declared-state edit should take effect immediately,
/// not wait behind the restart limiter), deleted nodes are shut down. This
/// is the optional external-collaborator wiring described in the design
/// notes, not part of the reconciliation core itself.
async fn forward_model_changes(
    handle: SupervisorHandle,
    model: Arc<dyn ModelStore>,
    cancel: CancellationToken,
) {
    let mut changes = model.subscribe();

    loop {
        let change = tokio::select! {
            _ = cancel.cancelled() => break,
            change = changes.recv() => change,
        };

        let waiter = match change {
            Ok(ModelChange::Created(node)) | Ok(ModelChange::Updated(node)) => {
                handle.verify(vec![node], false)
            }
            Ok(ModelChange::Deleted(node)) => handle.shutdown(vec![node]),
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "model change subscription lagged; some changes were dropped");
                continue;
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        };

        match waiter {
            Ok(rx) => {
                let _ = rx.await;
            }
            Err(err) => warn!(error = %err, "could not enqueue request for model change"),
        }
    }
}
