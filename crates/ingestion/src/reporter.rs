//! Periodic queue length reporting

use std::sync::Arc;
use std::time::Duration;

use contracts::StatsSink;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::trace;

use crate::queue::Queue;

/// Spawn a task that publishes `queue.len()` as gauge `name` every `interval`
///
/// The task runs until aborted.
pub fn spawn_queue_reporter<T: Send + 'static>(
    queue: Arc<Queue<T>>,
    stats: Arc<dyn StatsSink>,
    name: &'static str,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let len = queue.len();
            trace!(gauge = name, len, "Queue length");
            stats.gauge(name, len as f64);
        }
    })
}
