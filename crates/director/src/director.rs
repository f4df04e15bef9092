//! Director - the central dispatch loop
//!
//! The loop is the only mutator of the cache and of every pending buffer.
//! Record creation is delegated to the Loader; everything else happens here.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    stat, ClusterRouter, IncomingPoint, Persistence, ReceiverConfig, SeriesSpec, Standalone,
    StatsSink,
};
use ingestion::{spawn_queue_reporter, ElasticRelay};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::cache::{DataSourceCache, SpecMatcher};
use crate::error::DirectorError;
use crate::forward::run_forward_reader;
use crate::handle::DirectorHandle;
use crate::loader::Loader;
use crate::message::{Inbound, LoadRequest, ResolvedHandle};
use crate::metrics::DirectorCounters;
use crate::route::{local_or_forward, ClusterLink, RouteOutcome};

/// Director tuning
#[derive(Debug, Clone)]
pub struct DirectorConfig {
    /// Capacity of each bounded hand-off channel
    pub channel_capacity: usize,
    /// Accumulated point count above which flushes block the loop
    pub flush_threshold: u64,
    /// Upper bound for a cluster rebalance
    pub rebalance_timeout: Duration,
    /// Queue length gauge period
    pub report_interval: Duration,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self::from_receiver(&ReceiverConfig::default())
    }
}

impl DirectorConfig {
    pub fn from_receiver(config: &ReceiverConfig) -> Self {
        Self {
            channel_capacity: config.channel_capacity,
            flush_threshold: config.flush_threshold,
            rebalance_timeout: config.rebalance_timeout(),
            report_interval: config.report_interval(),
        }
    }
}

/// Lifecycle of the Director loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectorState {
    Starting,
    Running,
    /// Shutdown received: no new loads, draining what is in flight
    Draining,
    Stopped,
}

impl fmt::Display for DirectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Builder for creating a Director
pub struct DirectorBuilder<P, C = Standalone> {
    config: DirectorConfig,
    specs: Vec<SeriesSpec>,
    persistence: Arc<P>,
    stats: Arc<dyn StatsSink>,
    cluster: Option<Arc<C>>,
}

impl<P> DirectorBuilder<P> {
    /// Create a builder for a Director without clustering
    pub fn new(
        config: DirectorConfig,
        specs: Vec<SeriesSpec>,
        persistence: Arc<P>,
        stats: Arc<dyn StatsSink>,
    ) -> Self {
        Self {
            config,
            specs,
            persistence,
            stats,
            cluster: None,
        }
    }

    /// Route points through `cluster`
    pub fn with_cluster<C>(self, cluster: Arc<C>) -> DirectorBuilder<P, C> {
        DirectorBuilder {
            config: self.config,
            specs: self.specs,
            persistence: self.persistence,
            stats: self.stats,
            cluster: Some(cluster),
        }
    }
}

impl<P, C> DirectorBuilder<P, C>
where
    P: Persistence + Sync + 'static,
    C: ClusterRouter + Sync + 'static,
{
    /// Start the Director and its helper tasks
    ///
    /// Order: cluster registration, inbound relay with its `queue_len`
    /// reporter, Loader, then the loop itself.
    ///
    /// # Errors
    /// Fails if a series pattern does not compile or the forward channel
    /// cannot be registered.
    #[instrument(
        name = "director_builder_start",
        skip(self),
        fields(series = self.specs.len(), clustered = self.cluster.is_some())
    )]
    pub fn start(self) -> Result<DirectorHandle<P::Record>, DirectorError> {
        let matcher = SpecMatcher::new(self.specs)?;
        let config = self.config;
        let counters = Arc::new(DirectorCounters::new());
        let (state_tx, state_rx) = watch::channel(DirectorState::Starting);

        let (inbound_tx, relay_rx) = mpsc::channel(config.channel_capacity);
        let (relay_tx, processing_rx) = mpsc::channel(config.channel_capacity);

        let mut tasks = Vec::new();
        let mut membership = None;
        let cluster = match self.cluster {
            Some(router) => {
                membership = Some(router.membership_changes());
                let channel = router.register_forward_channel()?;
                tasks.push(tokio::spawn(run_forward_reader(
                    channel.rx,
                    inbound_tx.clone(),
                )));
                router.mark_ready(true);
                info!(node = %router.local_node().name(), "Registered with cluster");
                Some(ClusterLink {
                    router,
                    forward_tx: channel.tx,
                })
            }
            None => None,
        };

        let mut inbound_relay = ElasticRelay::spawn("inbound", relay_rx, relay_tx);
        let inbound_queue = Arc::clone(inbound_relay.queue());
        tasks.push(spawn_queue_reporter(
            Arc::clone(&inbound_queue),
            Arc::clone(&self.stats),
            stat::QUEUE_LEN,
            config.report_interval,
        ));

        let loader = Loader::new(
            Arc::clone(&self.persistence),
            Arc::clone(&self.stats),
            Arc::clone(&counters),
        )
        .spawn(
            config.channel_capacity,
            config.report_interval,
            inbound_tx.clone(),
            inbound_relay.take_closer(),
        );
        let load_queue = Arc::clone(loader.queue());
        let (loader_tx, loader_reporter, loader_worker) = loader.into_parts();
        tasks.push(loader_reporter);

        let director = Director {
            config,
            persistence: self.persistence,
            cluster,
            cache: DataSourceCache::new(matcher),
            stats: self.stats,
            counters: Arc::clone(&counters),
            rx: processing_rx,
            loader_tx: Some(loader_tx),
            membership,
            tasks,
            state_tx,
        };
        let join = tokio::spawn(async move {
            director.run().await;
            if let Err(e) = loader_worker.await {
                warn!(error = ?e, "Loader task panicked");
            }
            let relay = inbound_relay.metrics().snapshot();
            inbound_relay.join().await;
            debug!(
                received = relay.received,
                spilled = relay.spilled,
                peak_queue_len = relay.peak_queue_len,
                "Inbound relay finished"
            );
        });

        Ok(DirectorHandle::new(
            inbound_tx,
            counters,
            inbound_queue,
            load_queue,
            state_rx,
            join,
        ))
    }
}

/// The dispatch loop and everything it owns
struct Director<P: Persistence, C> {
    config: DirectorConfig,
    persistence: Arc<P>,
    cluster: Option<ClusterLink<C>>,
    cache: DataSourceCache<P::Record>,
    stats: Arc<dyn StatsSink>,
    counters: Arc<DirectorCounters>,
    rx: mpsc::Receiver<Inbound<P::Record>>,
    loader_tx: Option<mpsc::Sender<LoadRequest>>,
    membership: Option<mpsc::Receiver<()>>,
    /// Reporters and the forward reader, aborted on exit
    tasks: Vec<JoinHandle<()>>,
    state_tx: watch::Sender<DirectorState>,
}

/// What to do with a point after it was buffered
enum NextStep {
    Unroutable,
    Wait,
    Load(LoadRequest),
    Route(String),
}

impl<P, C> Director<P, C>
where
    P: Persistence + Sync + 'static,
    C: ClusterRouter + Sync + 'static,
{
    /// Run until the processing queue closes
    #[instrument(name = "director_run", skip(self))]
    async fn run(mut self) {
        self.set_state(DirectorState::Running);
        info!(
            clustered = self.cluster.is_some(),
            flush_threshold = self.config.flush_threshold,
            "Director started"
        );

        loop {
            tokio::select! {
                biased;

                change = next_change(&mut self.membership) => match change {
                    Some(()) => self.rebalance().await,
                    None => {
                        debug!("Membership notifications ended");
                        self.membership = None;
                    }
                },

                item = self.rx.recv() => match item {
                    Some(Inbound::Point(point)) => self.handle_point(point).await,
                    Some(Inbound::Handle(resolved)) => self.handle_resolved(resolved).await,
                    Some(Inbound::Shutdown) => self.begin_drain(),
                    None => break,
                },
            }
        }

        self.stop();
    }

    async fn handle_point(&mut self, point: IncomingPoint) {
        self.counters.inc_total();
        self.stats.count(stat::DATAPOINTS_TOTAL, 1.0);

        if point.is_nan() {
            trace!(ident = %point.ident, "NaN value, skipping");
            self.counters.inc_nan_skipped();
            return;
        }

        let next = match self.cache.resolve_or_placeholder(&point.ident) {
            None => {
                debug!(ident = %point.ident, "No series spec matches, dropping point");
                NextStep::Unroutable
            }
            Some(handle) => {
                handle.pending.push(point);
                if !handle.needs_materialization() {
                    NextStep::Route(handle.ident.clone())
                } else if handle.loading {
                    NextStep::Wait
                } else {
                    handle.loading = true;
                    NextStep::Load(LoadRequest::new(
                        handle.ident.clone(),
                        Arc::clone(&handle.spec),
                    ))
                }
            }
        };

        match next {
            NextStep::Unroutable => self.record_dropped(1),
            NextStep::Wait => {}
            NextStep::Load(request) => self.submit_load(request).await,
            NextStep::Route(ident) => self.route(&ident).await,
        }
    }

    async fn handle_resolved(&mut self, resolved: ResolvedHandle<P::Record>) {
        let ResolvedHandle {
            ident,
            record,
            created,
        } = resolved;

        let Some(handle) = self.cache.get_mut(&ident) else {
            warn!(ident = %ident, "Resolved handle for unknown identifier");
            return;
        };
        handle.loading = false;

        match record {
            Some(record) => {
                if created {
                    debug!(ident = %ident, pending = handle.pending.len(), "New series ready");
                }
                handle.record = Some(record);
            }
            None => {
                debug!(
                    ident = %ident,
                    pending = handle.pending.len(),
                    "Load failed, retrying on next point"
                );
                return;
            }
        }

        self.route(&ident).await;
    }

    async fn submit_load(&mut self, request: LoadRequest) {
        let ident = request.ident.clone();
        let sent = match &self.loader_tx {
            Some(tx) => tx.send(request).await.is_ok(),
            None => false,
        };
        if sent {
            return;
        }

        let dropped = match self.cache.get_mut(&ident) {
            Some(handle) => {
                handle.loading = false;
                handle.take_pending().len() as u64
            }
            None => 0,
        };
        warn!(ident = %ident, dropped, "Loader closed, dropping points of unloaded series");
        self.record_dropped(dropped);
    }

    async fn route(&mut self, ident: &str) {
        let Some(handle) = self.cache.get_mut(ident) else {
            return;
        };
        let outcome = local_or_forward(
            handle,
            self.persistence.as_ref(),
            self.cluster.as_ref(),
            self.config.flush_threshold,
        )
        .await;
        self.record_outcome(&outcome);
    }

    fn record_outcome(&self, outcome: &RouteOutcome) {
        if outcome.accepted > 0 {
            self.counters.add_accepted(outcome.accepted);
            self.stats
                .count(stat::DATAPOINTS_ACCEPTED, outcome.accepted as f64);
        }
        for (destination, count) in &outcome.forwarded {
            self.counters.add_forwarded(*count);
            self.stats
                .count(&stat::forwarded_to(destination), *count as f64);
            self.stats.count(stat::DATAPOINTS_FORWARDED, *count as f64);
        }
        self.record_dropped(outcome.dropped);
    }

    fn record_dropped(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.counters.add_dropped(count);
        self.stats.count(stat::DATAPOINTS_DROPPED, count as f64);
    }

    async fn rebalance(&mut self) {
        let Some(link) = &self.cluster else {
            return;
        };
        let timeout = self.config.rebalance_timeout;
        info!(timeout_ms = timeout.as_millis() as u64, "Membership changed, rebalancing");

        match tokio::time::timeout(timeout, link.router.rebalance(timeout)).await {
            Ok(Ok(())) => info!("Rebalance complete"),
            Ok(Err(e)) => warn!(error = %e, "Rebalance failed, continuing with stale view"),
            Err(_) => warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Rebalance timed out, continuing with stale view"
            ),
        }
    }

    fn begin_drain(&mut self) {
        if self.loader_tx.take().is_some() {
            info!(series = self.cache.len(), "Shutdown requested, draining");
            self.set_state(DirectorState::Draining);
        }
    }

    fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(link) = &self.cluster {
            link.router.mark_ready(false);
        }

        let stranded = self.cache.discard_pending();
        if stranded > 0 {
            warn!(stranded, "Discarding points of series that never loaded");
            self.record_dropped(stranded);
        }

        info!(counters = %self.counters.snapshot(), "Director stopped");
        self.set_state(DirectorState::Stopped);
    }

    fn set_state(&self, state: DirectorState) {
        self.state_tx.send_replace(state);
    }
}

async fn next_change(membership: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match membership {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
