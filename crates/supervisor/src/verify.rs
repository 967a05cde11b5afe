//! The reconciliation procedures: liveness → restart, queue-set
//! reconciliation, autoscale reconciliation. See §4.6.

use std::time::Duration;

use fleet_common::{Node, SupervisorError};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::{
    bucket::TokenBucketRegistry, broker::BrokerPool, gate::BrokerGate, insured::insured,
    model::ModelStore, pause::PauseFlag,
};

/// Everything a verify step needs, bundled so the §4.6 functions don't each
/// take eight parameters. Borrowed fresh from the reconciler for each
/// node's worth of work.
pub struct VerifyContext<'a> {
    pub broker: &'a dyn BrokerPool,
    pub model: &'a dyn ModelStore,
    pub pause: &'a PauseFlag,
    pub gate: &'a BrokerGate,
    pub cancel: &'a CancellationToken,
    pub respond_to_ping: &'a (dyn Fn() + Send + Sync),
    pub buckets: &'a mut TokenBucketRegistry,
}

/// §4.6.1
pub async fn verify_node(
    ctx: &mut VerifyContext<'_>,
    node: &Node,
    ratelimit: bool,
) -> Result<(), SupervisorError> {
    if ctx.pause.is_paused() {
        return Ok(());
    }

    if node.is_live() {
        let alive = insured(node, ctx.broker, ctx.pause, ctx.gate, ctx.cancel, ctx.respond_to_ping, |c| async move {
            c.alive().await
        })
        .await?;

        if !alive {
            restart_node(ctx, node, ratelimit).await?;
        }
        verify_node_processes(ctx, node).await?;
        verify_node_queues(ctx, node).await?;
    } else {
        let alive = insured(node, ctx.broker, ctx.pause, ctx.gate, ctx.cancel, ctx.respond_to_ping, |c| async move {
            c.alive().await
        })
        .await?;

        if alive {
            stop_node(ctx, node).await?;
        }
    }

    Ok(())
}

/// §4.6.2
pub async fn restart_node(
    ctx: &mut VerifyContext<'_>,
    node: &Node,
    ratelimit: bool,
) -> Result<(), SupervisorError> {
    if !ratelimit {
        ctx.buckets.forget(node.id);
        return verify_restart(ctx, node).await;
    }

    if !ctx.gate.may_restart() {
        return Ok(());
    }

    if ctx.buckets.try_consume(node.id) {
        verify_restart(ctx, node).await
    } else {
        error!(%node, "{}", SupervisorError::NodeRestartRateExceeded);
        ctx.model.disable(node.id).await;
        ctx.buckets.forget(node.id);
        Ok(())
    }
}

/// §4.6.3 — restart, then probe with a geometrically increasing timeout
/// (0.1s up to 1.0s, at most 30 attempts).
pub async fn verify_restart(ctx: &mut VerifyContext<'_>, node: &Node) -> Result<(), SupervisorError> {
    warn!(%node, "node.restart");
    insured(node, ctx.broker, ctx.pause, ctx.gate, ctx.cancel, ctx.respond_to_ping, |c| async move {
        c.restart().await
    })
    .await?;

    let mut timeout_secs = 0.1_f64;
    let mut is_alive = false;

    for _ in 0..30 {
        (ctx.respond_to_ping)();
        let timeout = Duration::from_secs_f64(timeout_secs);
        let replied = insured(node, ctx.broker, ctx.pause, ctx.gate, ctx.cancel, ctx.respond_to_ping, move |c| {
            async move { c.responds_to_ping(timeout).await }
        })
        .await?;

        if replied {
            is_alive = true;
            break;
        }
        timeout_secs = (timeout_secs * 1.4).min(1.0);
    }

    if is_alive {
        warn!(%node, "successfully restarted");
    } else {
        warn!(%node, "{}", SupervisorError::NodeNoPingAfterRestart);
    }

    Ok(())
}

/// §4.6.4
pub async fn verify_node_queues(ctx: &mut VerifyContext<'_>, node: &Node) -> Result<(), SupervisorError> {
    let reply = insured(node, ctx.broker, ctx.pause, ctx.gate, ctx.cancel, ctx.respond_to_ping, |c| async move {
        c.consuming_from().await
    })
    .await?;

    let Some(reply) = reply else {
        return Ok(());
    };

    let observed: std::collections::HashSet<String> = reply.into_keys().collect();
    let declared = &node.queues;

    for queue in observed.symmetric_difference(declared) {
        if declared.contains(queue) {
            warn!(%node, %queue, "node.consume_from");
            insured(node, ctx.broker, ctx.pause, ctx.gate, ctx.cancel, ctx.respond_to_ping, move |c| {
                let queue = queue.to_string();
                async move { c.add_queue(&queue).await }
            })
            .await?;
        } else if queue == &node.direct_queue {
            continue;
        } else {
            warn!(%node, %queue, "node.cancel_consume");
            insured(node, ctx.broker, ctx.pause, ctx.gate, ctx.cancel, ctx.respond_to_ping, move |c| {
                let queue = queue.to_string();
                async move { c.cancel_queue(&queue).await }
            })
            .await?;
        }
    }

    Ok(())
}

/// §4.6.5
pub async fn verify_node_processes(ctx: &mut VerifyContext<'_>, node: &Node) -> Result<(), SupervisorError> {
    let stats = insured(node, ctx.broker, ctx.pause, ctx.gate, ctx.cancel, ctx.respond_to_ping, |c| async move {
        c.stats().await
    })
    .await?;

    let Some(current) = stats.autoscaler else {
        // ModelShapeError: no autoscaler section reported yet. Silently
        // skip this check for this cycle; the next cycle re-checks.
        return Ok(());
    };

    if current.max != node.max_concurrency || current.min != node.min_concurrency {
        let (max, min) = (node.max_concurrency, node.min_concurrency);
        warn!(%node, max, min, "node.set_autoscale");
        insured(node, ctx.broker, ctx.pause, ctx.gate, ctx.cancel, ctx.respond_to_ping, move |c| async move {
            c.autoscale(max, min).await
        })
        .await?;
    }

    Ok(())
}

/// §4.6.6
pub async fn stop_node(ctx: &mut VerifyContext<'_>, node: &Node) -> Result<(), SupervisorError> {
    warn!(%node, "node.shutdown");
    insured(node, ctx.broker, ctx.pause, ctx.gate, ctx.cancel, ctx.respond_to_ping, |c| async move {
        c.stop().await
    })
    .await
}
