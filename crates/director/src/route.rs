//! Local-or-forward decision for a handle with buffered points

use std::sync::Arc;

use contracts::{
    ClusterNode, ClusterRouter, DistributedDatum, ForwardEnvelope, IncomingPoint, Persistence,
    SeriesRecord,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cache::CachedHandle;
use crate::forward::{forward_point, Forwarded};

/// Cluster side of the Director: the router and the outbound transport
pub(crate) struct ClusterLink<C> {
    pub router: Arc<C>,
    pub forward_tx: mpsc::Sender<ForwardEnvelope>,
}

/// What happened to the points of one routing pass
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Points applied to the local record
    pub accepted: u64,
    /// Points sent, per destination (sanitized address)
    pub forwarded: Vec<(String, u64)>,
    /// Failed apply or forward attempts
    pub dropped: u64,
}

/// Apply the handle's buffered points locally or forward them to their owners
///
/// The buffer is consumed once and handed to every owner. When the local node
/// is not among the owners, the record's in-memory aggregation state is
/// cleared so nothing reaches storage for a series owned elsewhere. With no
/// known owners the points stay buffered. Points that already took their one
/// hop are not sent on; they count as dropped only when no owner is local.
pub(crate) async fn local_or_forward<P, C>(
    handle: &mut CachedHandle<P::Record>,
    persistence: &P,
    cluster: Option<&ClusterLink<C>>,
    flush_threshold: u64,
) -> RouteOutcome
where
    P: Persistence,
    C: ClusterRouter,
{
    let mut outcome = RouteOutcome::default();
    if handle.needs_materialization() || handle.pending.is_empty() {
        return outcome;
    }

    let Some(link) = cluster else {
        let points = handle.take_pending();
        apply_locally(handle, &points, persistence, flush_threshold, &mut outcome).await;
        return outcome;
    };

    let owners = link
        .router
        .owners_of(&DistributedDatum::new(&handle.ident, handle.id()));
    if owners.is_empty() {
        debug!(
            ident = %handle.ident,
            pending = handle.pending.len(),
            "No known owners, keeping points buffered"
        );
        return outcome;
    }

    let local = link.router.local_node();
    let points = handle.take_pending();
    let mut owned_locally = false;
    let mut skipped = 0;

    for node in &owners {
        if node.name() == local.name() {
            owned_locally = true;
            apply_locally(handle, &points, persistence, flush_threshold, &mut outcome).await;
        } else {
            let node_skipped =
                forward_all(&handle.ident, &points, node, &link.forward_tx, &mut outcome);
            skipped = skipped.max(node_skipped);
        }
    }

    if !owned_locally {
        outcome.dropped += skipped;
        clear_aggregation(handle);
    }

    outcome
}

async fn apply_locally<P: Persistence>(
    handle: &mut CachedHandle<P::Record>,
    points: &[IncomingPoint],
    persistence: &P,
    flush_threshold: u64,
    outcome: &mut RouteOutcome,
) {
    let Some(record) = handle.record.as_mut() else {
        return;
    };

    for point in points {
        match record.apply(point) {
            Ok(()) => outcome.accepted += 1,
            Err(e) => {
                warn!(ident = %handle.ident, error = %e, "Point rejected by storage");
                outcome.dropped += 1;
            }
        }
    }

    let pending = record.point_count();
    if pending == 0 {
        return;
    }

    // Past the threshold the loop waits for storage, slowing intake.
    let blocking = pending > flush_threshold;
    if blocking {
        debug!(ident = %handle.ident, pending, "Flush threshold exceeded, blocking flush");
    }
    if let Err(e) = persistence.flush(record, blocking).await {
        warn!(ident = %handle.ident, blocking, error = %e, "Flush failed");
    }
}

/// Send every point to `node`; returns how many were skipped as already forwarded
fn forward_all(
    ident: &str,
    points: &[IncomingPoint],
    node: &ClusterNode,
    tx: &mpsc::Sender<ForwardEnvelope>,
    outcome: &mut RouteOutcome,
) -> u64 {
    let mut sent = 0;
    let mut skipped = 0;

    for point in points {
        match forward_point(point, node, tx) {
            Ok(Forwarded::Sent) => sent += 1,
            Ok(Forwarded::AlreadyForwarded) => {
                debug!(
                    ident = %ident,
                    node = %node.name(),
                    hops = point.hops,
                    "Point already forwarded once, not sending again"
                );
                skipped += 1;
            }
            Err(e) => {
                warn!(ident = %ident, node = %node.name(), error = %e, "Error forwarding a data point");
                outcome.dropped += 1;
            }
        }
    }

    if sent > 0 {
        outcome.forwarded.push((node.sanitized_addr(), sent));
    }
    skipped
}

fn clear_aggregation<R: SeriesRecord>(handle: &mut CachedHandle<R>) {
    let Some(record) = handle.record.as_mut() else {
        return;
    };
    let pending = record.point_count();
    if pending > 0 {
        warn!(
            ident = %handle.ident,
            pending,
            "Clearing series owned elsewhere with unsaved points"
        );
    }
    record.clear();
}
