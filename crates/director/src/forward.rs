//! Cluster forwarding: outbound hand-off and the inbound envelope reader

use contracts::{ClusterNode, ContractError, ForwardEnvelope, IncomingPoint, MAX_HOPS};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, instrument, warn};

use crate::message::Inbound;

/// Outcome of a single forward attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forwarded {
    /// Handed to the transport with the hop count incremented
    Sent,
    /// Already forwarded once; points are never forwarded twice
    AlreadyForwarded,
}

/// Forward `point` to `node` over the forward channel
///
/// Only points that have never been forwarded (hops == 0) leave this node.
/// The sent copy carries `hops + 1`. Never waits on the transport.
///
/// # Errors
/// `NodeNotReady` if the destination does not accept traffic, a forward
/// channel error if the transport is full or gone, an encode error otherwise.
pub fn forward_point(
    point: &IncomingPoint,
    node: &ClusterNode,
    tx: &mpsc::Sender<ForwardEnvelope>,
) -> Result<Forwarded, ContractError> {
    if point.was_forwarded() {
        return Ok(Forwarded::AlreadyForwarded);
    }
    if !node.ready() {
        return Err(ContractError::node_not_ready(node.name()));
    }

    let mut outgoing = point.clone();
    outgoing.hops += 1;
    debug_assert!(outgoing.hops <= MAX_HOPS);

    let envelope = ForwardEnvelope::encode(node, &outgoing)?;
    match tx.try_send(envelope) {
        Ok(()) => Ok(Forwarded::Sent),
        Err(TrySendError::Full(_)) => Err(ContractError::forward_channel(format!(
            "transport full, point for '{}' not sent",
            node.name()
        ))),
        Err(TrySendError::Closed(_)) => Err(ContractError::forward_channel("transport closed")),
    }
}

/// Read envelopes forwarded by other nodes into the Director's inbound path
///
/// Undecodable envelopes and points past the hop limit are logged and dropped.
/// Returns when either side closes.
#[instrument(name = "forward_reader_loop", skip_all)]
pub async fn run_forward_reader<R>(
    mut rx: mpsc::Receiver<ForwardEnvelope>,
    inbound: mpsc::Sender<Inbound<R>>,
) {
    let mut received: u64 = 0;

    while let Some(envelope) = rx.recv().await {
        let point = match envelope.decode() {
            Ok(point) => point,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable forwarded point");
                continue;
            }
        };

        if point.exceeds_hop_limit() {
            warn!(
                ident = %point.ident,
                hops = point.hops,
                max_hops = MAX_HOPS,
                "Dropping forwarded point, hop limit reached"
            );
            continue;
        }

        received += 1;
        if inbound.send(Inbound::Point(point)).await.is_err() {
            debug!("Director inbound closed, forward reader stopping");
            break;
        }
    }

    info!(received, "Forward reader stopped");
}
