//! DirectorHandle - producer and monitoring side of a running Director

use std::sync::Arc;

use contracts::IncomingPoint;
use ingestion::Queue;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};

use crate::director::DirectorState;
use crate::error::DirectorError;
use crate::message::{Inbound, LoadRequest};
use crate::metrics::DirectorCounters;

/// Cloneable point submitter for producers
pub struct PointSender<R> {
    tx: mpsc::Sender<Inbound<R>>,
}

impl<R> Clone for PointSender<R> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<R> PointSender<R> {
    /// Submit a point
    ///
    /// Waits only for channel capacity, which the inbound relay frees
    /// continuously regardless of how slow the Director is.
    ///
    /// # Errors
    /// `InboundClosed` once the Director is shutting down
    pub async fn submit(&self, point: IncomingPoint) -> Result<(), DirectorError> {
        self.tx
            .send(Inbound::Point(point))
            .await
            .map_err(|_| DirectorError::InboundClosed)
    }

    /// Submit a point without waiting
    ///
    /// # Errors
    /// `InboundFull` if the channel is momentarily full, `InboundClosed` once
    /// the Director is shutting down
    pub fn try_submit(&self, point: IncomingPoint) -> Result<(), DirectorError> {
        self.tx.try_send(Inbound::Point(point)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DirectorError::InboundFull,
            mpsc::error::TrySendError::Closed(_) => DirectorError::InboundClosed,
        })
    }
}

/// Handle to a running Director
pub struct DirectorHandle<R> {
    tx: mpsc::Sender<Inbound<R>>,
    counters: Arc<DirectorCounters>,
    inbound_queue: Arc<Queue<Inbound<R>>>,
    load_queue: Arc<Queue<LoadRequest>>,
    state_rx: watch::Receiver<DirectorState>,
    join: JoinHandle<()>,
}

impl<R> DirectorHandle<R> {
    pub(crate) fn new(
        tx: mpsc::Sender<Inbound<R>>,
        counters: Arc<DirectorCounters>,
        inbound_queue: Arc<Queue<Inbound<R>>>,
        load_queue: Arc<Queue<LoadRequest>>,
        state_rx: watch::Receiver<DirectorState>,
        join: JoinHandle<()>,
    ) -> Self {
        Self {
            tx,
            counters,
            inbound_queue,
            load_queue,
            state_rx,
            join,
        }
    }

    /// New submitter for a producer
    pub fn sender(&self) -> PointSender<R> {
        PointSender {
            tx: self.tx.clone(),
        }
    }

    pub fn counters(&self) -> &Arc<DirectorCounters> {
        &self.counters
    }

    /// Items parked in the inbound relay
    pub fn queue_len(&self) -> usize {
        self.inbound_queue.len()
    }

    /// Requests parked in the load relay
    pub fn load_queue_len(&self) -> usize {
        self.load_queue.len()
    }

    pub fn state(&self) -> DirectorState {
        *self.state_rx.borrow()
    }

    /// Receiver of lifecycle transitions
    pub fn state_changes(&self) -> watch::Receiver<DirectorState> {
        self.state_rx.clone()
    }

    /// Request shutdown and wait for the loop to drain and stop
    ///
    /// Points already accepted are processed; submits racing with shutdown
    /// may fail with `InboundClosed`.
    #[instrument(name = "director_handle_shutdown", skip(self))]
    pub async fn shutdown(self) {
        if self.tx.send(Inbound::Shutdown).await.is_err() {
            debug!("Director inbound already closed");
        }
        drop(self.tx);
        if let Err(e) = self.join.await {
            error!(error = ?e, "Director task panicked");
        }
        let state = *self.state_rx.borrow();
        debug!(%state, "DirectorHandle shutdown complete");
    }
}
