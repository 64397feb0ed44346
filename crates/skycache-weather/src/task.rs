//! Refresh tasks and the scheduler seam the read path enqueues onto.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::provider::WeatherProvider;
use crate::types::WeatherData;

/// Queue used when nothing else is configured.
pub const DEFAULT_QUEUE: &str = "default";

/// "Fetch live data for this location now."
///
/// Not bound to a provider: whoever executes the task supplies the active one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefreshTask {
    pub lat: f64,
    pub lon: f64,
}

impl RefreshTask {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Execute against the active provider.
    ///
    /// Failures are absorbed by the provider; `None` means the refresh
    /// failed and an error placeholder was cached.
    pub async fn handle(&self, provider: &WeatherProvider) -> Option<WeatherData> {
        provider.refresh_now(self.lat, self.lon).await
    }
}

/// Fire-and-forget work queue.
///
/// Duplicate tasks for the same location are allowed.
pub trait RefreshScheduler: Send + Sync {
    fn schedule(&self, task: RefreshTask, queue: &str);
}

/// A task as it sits on a queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedTask {
    pub task: RefreshTask,
    pub queue: String,
}

/// Scheduler backed by an unbounded tokio channel drained by a
/// [`RefreshWorker`](crate::worker::RefreshWorker).
#[derive(Debug, Clone)]
pub struct ChannelScheduler {
    tx: mpsc::UnboundedSender<QueuedTask>,
}

impl ChannelScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<QueuedTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RefreshScheduler for ChannelScheduler {
    fn schedule(&self, task: RefreshTask, queue: &str) {
        let queued = QueuedTask {
            task,
            queue: queue.to_string(),
        };
        if self.tx.send(queued).is_err() {
            tracing::warn!(
                "Refresh queue closed, dropping task for {}, {}",
                task.lat,
                task.lon
            );
        }
    }
}
