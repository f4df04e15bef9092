//! UdpTransport - forward envelopes between nodes over UDP
//!
//! Fire-and-forget: an envelope lost on the wire is lost, which keeps
//! forwarding at-most-once.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use contracts::{ClusterNode, ContractError, ForwardEnvelope};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::static_cluster::ClusterTransport;

/// Largest datagram accepted
const MAX_DATAGRAM: usize = 65_507;

/// Running transport tasks
pub struct UdpTransport {
    local_addr: SocketAddr,
    sender: JoinHandle<()>,
    receiver: JoinHandle<()>,
}

impl UdpTransport {
    /// Bind `bind_addr` and start moving envelopes
    ///
    /// Outbound envelopes are sent to the address of their destination node
    /// in `peers`; datagrams received are decoded and pushed to the Director.
    ///
    /// # Errors
    /// Returns an I/O error if the socket cannot be bound, or a validation
    /// error if a peer address does not parse.
    #[instrument(name = "udp_transport_start", skip(transport, peers))]
    pub async fn start(
        bind_addr: &str,
        peers: &[ClusterNode],
        transport: ClusterTransport,
    ) -> Result<Self, ContractError> {
        let peers = peers
            .iter()
            .map(|node| {
                node.addr()
                    .parse::<SocketAddr>()
                    .map(|addr| (node.name().to_string(), addr))
                    .map_err(|e| {
                        ContractError::config_validation(
                            format!("cluster.nodes.{}.addr", node.name()),
                            e.to_string(),
                        )
                    })
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
        let local_addr = socket.local_addr()?;
        info!(addr = %local_addr, peers = peers.len(), "UDP forward transport bound");

        let ClusterTransport { outbound, inbound } = transport;
        let sender = tokio::spawn(send_loop(Arc::clone(&socket), outbound, peers));
        let receiver = tokio::spawn(recv_loop(socket, inbound));

        Ok(Self {
            local_addr,
            sender,
            receiver,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop both directions
    pub fn shutdown(self) {
        self.sender.abort();
        self.receiver.abort();
        debug!(addr = %self.local_addr, "UDP forward transport stopped");
    }
}

#[instrument(name = "udp_transport_send_loop", skip_all)]
async fn send_loop(
    socket: Arc<UdpSocket>,
    mut outbound: mpsc::Receiver<ForwardEnvelope>,
    peers: HashMap<String, SocketAddr>,
) {
    while let Some(envelope) = outbound.recv().await {
        let Some(addr) = peers.get(&envelope.destination) else {
            warn!(node = %envelope.destination, "Unknown destination, envelope dropped");
            continue;
        };

        let payload = match bincode::serialize(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Envelope serialization failed");
                continue;
            }
        };

        if let Err(e) = socket.send_to(&payload, addr).await {
            warn!(node = %envelope.destination, addr = %addr, error = %e, "Send failed");
        }
    }
    debug!("Outbound forward channel closed");
}

#[instrument(name = "udp_transport_recv_loop", skip_all)]
async fn recv_loop(socket: Arc<UdpSocket>, inbound: mpsc::Sender<ForwardEnvelope>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!(error = %e, "Receive failed");
                continue;
            }
        };

        let envelope: ForwardEnvelope = match bincode::deserialize(&buf[..len]) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(from = %from, error = %e, "Undecodable datagram dropped");
                continue;
            }
        };

        if inbound.send(envelope).await.is_err() {
            debug!("Inbound forward channel closed");
            break;
        }
    }
}
