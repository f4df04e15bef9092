//! Loader - the single worker that materializes placeholder handles
//!
//! Every persisted-record creation goes through this one task, so concurrent
//! first arrivals of an identifier create at most one record.

use std::sync::Arc;
use std::time::Duration;

use contracts::{stat, Fetched, Persistence, SeriesRecord, StatsSink};
use ingestion::{spawn_queue_reporter, ElasticRelay, Queue, RelayCloser};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::message::{Inbound, LoadRequest, ResolvedHandle};
use crate::metrics::DirectorCounters;

/// Serialized materialization worker
pub struct Loader<P> {
    persistence: Arc<P>,
    stats: Arc<dyn StatsSink>,
    counters: Arc<DirectorCounters>,
}

/// Running Loader: its input path and monitoring handles
pub struct LoaderHandle {
    tx: mpsc::Sender<LoadRequest>,
    queue: Arc<Queue<LoadRequest>>,
    reporter: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl LoaderHandle {
    /// Sender for new placeholders
    pub fn sender(&self) -> mpsc::Sender<LoadRequest> {
        self.tx.clone()
    }

    /// Requests waiting in the load relay
    pub fn queue(&self) -> &Arc<Queue<LoadRequest>> {
        &self.queue
    }

    pub(crate) fn into_parts(self) -> (mpsc::Sender<LoadRequest>, JoinHandle<()>, JoinHandle<()>) {
        (self.tx, self.reporter, self.worker)
    }
}

impl<P> Loader<P>
where
    P: Persistence + Sync + 'static,
{
    pub fn new(
        persistence: Arc<P>,
        stats: Arc<dyn StatsSink>,
        counters: Arc<DirectorCounters>,
    ) -> Self {
        Self {
            persistence,
            stats,
            counters,
        }
    }

    /// Start the load relay, its `load_queue_len` reporter, and the worker
    ///
    /// Resolved handles are sent to `output`. When the load input closes and
    /// the worker has drained it, `closer` (if any) closes the Director's
    /// inbound relay so shutdown propagates.
    #[instrument(name = "loader_spawn", skip(self, output, closer))]
    pub fn spawn(
        self,
        capacity: usize,
        report_interval: Duration,
        output: mpsc::Sender<Inbound<P::Record>>,
        closer: Option<RelayCloser>,
    ) -> LoaderHandle {
        let (tx, relay_rx) = mpsc::channel(capacity);
        let (relay_tx, worker_rx) = mpsc::channel(capacity);

        let relay = ElasticRelay::spawn("load", relay_rx, relay_tx);
        let queue = Arc::clone(relay.queue());
        let reporter = spawn_queue_reporter(
            Arc::clone(&queue),
            Arc::clone(&self.stats),
            stat::LOAD_QUEUE_LEN,
            report_interval,
        );

        let worker = tokio::spawn(self.run(worker_rx, output, closer));
        debug!("Loader started");

        LoaderHandle {
            tx,
            queue,
            reporter,
            worker,
        }
    }

    #[instrument(name = "loader_worker_loop", skip_all)]
    async fn run(
        self,
        mut rx: mpsc::Receiver<LoadRequest>,
        output: mpsc::Sender<Inbound<P::Record>>,
        closer: Option<RelayCloser>,
    ) {
        let mut loaded: u64 = 0;

        while let Some(request) = rx.recv().await {
            let resolved = self.materialize(request).await;
            loaded += 1;

            if output.send(Inbound::Handle(resolved)).await.is_err() {
                warn!("Director inbound closed, loader stopping");
                break;
            }
        }

        info!(loaded, "Loader input closed, shutting down");
        if let Some(closer) = closer {
            closer.close();
        }
    }

    /// Look the identifier up in persistence, creating it if absent
    ///
    /// Storage errors are logged and yield an unresolved handle.
    pub async fn materialize(&self, request: LoadRequest) -> ResolvedHandle<P::Record> {
        let LoadRequest { ident, spec } = request;

        match self.persistence.fetch_or_create(&ident, &spec).await {
            Ok(Fetched { record, created }) => {
                if created {
                    self.counters.inc_created();
                    self.stats.count(stat::CREATED, 1.0);
                    info!(ident = %ident, id = record.id(), "Created series");
                } else {
                    debug!(ident = %ident, id = record.id(), "Loaded series");
                }
                ResolvedHandle {
                    ident,
                    record: Some(record),
                    created,
                }
            }
            Err(e) => {
                error!(ident = %ident, error = %e, "Failed to load series");
                ResolvedHandle {
                    ident,
                    record: None,
                    created: false,
                }
            }
        }
    }
}
