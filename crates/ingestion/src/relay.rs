//! ElasticRelay - bridges an input channel to an output channel without
//! ever making the input side wait on the consumer

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::metrics::RelayMetrics;
use crate::queue::Queue;

/// Elastic relay between two bounded channels
///
/// Items are moved from `input` to `output` as fast as the input yields them.
/// When the output is full the item is parked in an unbounded [`Queue`]
/// and the queue is drained, in arrival order, whenever the consumer has room.
/// When the input is closed and the queue is empty the relay drops `output`,
/// which closes it for the consumer.
pub struct ElasticRelay<T> {
    name: String,
    input: mpsc::Receiver<T>,
    output: mpsc::Sender<T>,
    queue: Arc<Queue<T>>,
    metrics: Arc<RelayMetrics>,
    close_rx: oneshot::Receiver<()>,
}

impl<T: Send + 'static> ElasticRelay<T> {
    /// Spawn a relay task moving items from `input` to `output`
    pub fn spawn(
        name: impl Into<String>,
        input: mpsc::Receiver<T>,
        output: mpsc::Sender<T>,
    ) -> RelayHandle<T> {
        let name = name.into();
        let queue = Arc::new(Queue::new());
        let metrics = Arc::new(RelayMetrics::new());
        let (close_tx, close_rx) = oneshot::channel();

        let relay = Self {
            name: name.clone(),
            input,
            output,
            queue: Arc::clone(&queue),
            metrics: Arc::clone(&metrics),
            close_rx,
        };
        let join = tokio::spawn(relay.run());

        RelayHandle {
            closer: Some(RelayCloser {
                relay: name.clone(),
                tx: close_tx,
            }),
            name,
            queue,
            metrics,
            join,
        }
    }

    #[instrument(name = "elastic_relay_loop", skip(self), fields(relay = %self.name))]
    async fn run(self) {
        let Self {
            name,
            mut input,
            output,
            queue,
            metrics,
            mut close_rx,
        } = self;

        debug!(relay = %name, "Relay started");

        let mut input_open = true;
        let mut close_armed = true;

        loop {
            if !input_open && queue.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                signal = &mut close_rx, if close_armed => {
                    close_armed = false;
                    if signal.is_ok() {
                        debug!(relay = %name, "Input closed by pipeline");
                        input.close();
                    }
                }

                permit = output.reserve(), if !queue.is_empty() => match permit {
                    Ok(permit) => {
                        if let Some(item) = queue.try_pop() {
                            permit.send(item);
                            metrics.record_delivered();
                        }
                    }
                    Err(_) => {
                        let backlog = queue.len() as u64;
                        metrics.record_discarded(backlog);
                        warn!(relay = %name, backlog, "Output closed, discarding queued items");
                        return;
                    }
                },

                item = input.recv(), if input_open => match item {
                    Some(item) => {
                        if !accept(&name, item, &output, &queue, &metrics) {
                            return;
                        }
                    }
                    None => input_open = false,
                },
            }
        }

        debug!(
            relay = %name,
            delivered = metrics.snapshot().delivered,
            "Input drained, closing output"
        );
    }
}

/// Hand an item to the output, or park it if the consumer is not ready
///
/// Returns false if the output is closed.
fn accept<T>(
    name: &str,
    item: T,
    output: &mpsc::Sender<T>,
    queue: &Queue<T>,
    metrics: &RelayMetrics,
) -> bool {
    metrics.record_received();

    // Anything already parked must leave first.
    if !queue.is_empty() {
        queue.push(item);
        metrics.record_spilled(queue.len());
        return true;
    }

    match output.try_send(item) {
        Ok(()) => {
            metrics.record_delivered();
            true
        }
        Err(TrySendError::Full(item)) => {
            queue.push(item);
            metrics.record_spilled(queue.len());
            true
        }
        Err(TrySendError::Closed(_)) => {
            metrics.record_discarded(1);
            warn!(relay = %name, "Output closed, relay stopping");
            false
        }
    }
}

/// Handle to a running relay
pub struct RelayHandle<T> {
    name: String,
    queue: Arc<Queue<T>>,
    metrics: Arc<RelayMetrics>,
    closer: Option<RelayCloser>,
    join: JoinHandle<()>,
}

impl<T> RelayHandle<T> {
    /// The overflow queue, for gauges
    pub fn queue(&self) -> &Arc<Queue<T>> {
        &self.queue
    }

    /// Current number of parked items
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn metrics(&self) -> &Arc<RelayMetrics> {
        &self.metrics
    }

    /// Take the closer for this relay's input (only once)
    pub fn take_closer(&mut self) -> Option<RelayCloser> {
        self.closer.take()
    }

    /// Wait for the relay task to finish
    pub async fn join(self) {
        if let Err(e) = self.join.await {
            warn!(relay = %self.name, error = ?e, "Relay task panicked");
        }
    }
}

/// Closes a relay's input from inside the pipeline
///
/// After `close`, producer sends fail with a closed error; items already in
/// the input channel are still delivered. Dropping the closer without calling
/// `close` leaves the input open.
#[derive(Debug)]
pub struct RelayCloser {
    relay: String,
    tx: oneshot::Sender<()>,
}

impl RelayCloser {
    pub fn close(self) {
        if self.tx.send(()).is_err() {
            debug!(relay = %self.relay, "Relay already stopped");
        }
    }
}
