//! Background worker executing queued refresh tasks.
//! All network work for refreshes happens here, off the read path.

use std::sync::Arc;

use skycache_core::WeatherError;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

use crate::provider::WeatherProvider;
use crate::retry::{with_retry, RetryPolicy};
use crate::task::QueuedTask;
use crate::types::WeatherData;

pub struct RefreshWorker {
    rx: mpsc::UnboundedReceiver<QueuedTask>,
    provider: Arc<WeatherProvider>,
    policy: RetryPolicy,
    limit: Arc<Semaphore>,
}

impl RefreshWorker {
    pub fn new(
        rx: mpsc::UnboundedReceiver<QueuedTask>,
        provider: Arc<WeatherProvider>,
        policy: RetryPolicy,
        concurrency: usize,
    ) -> Self {
        Self {
            rx,
            provider,
            policy,
            limit: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Drain the queue until it closes or `cancel` fires.
    ///
    /// In-flight tasks are aborted on cancellation; a task that is cut short
    /// simply leaves the cache as it was.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            "Refresh worker started for provider {}",
            self.provider.id()
        );
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Refresh worker cancelled, aborting {} tasks", in_flight.len());
                    in_flight.shutdown().await;
                    break;
                }
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                queued = self.rx.recv() => {
                    let Some(queued) = queued else {
                        tracing::info!("Refresh queue closed");
                        while in_flight.join_next().await.is_some() {}
                        break;
                    };
                    tracing::debug!(
                        "Picked up refresh for {}, {} from queue {}",
                        queued.task.lat,
                        queued.task.lon,
                        queued.queue
                    );
                    in_flight.spawn(execute(
                        self.provider.clone(),
                        self.policy.clone(),
                        self.limit.clone(),
                        queued,
                    ));
                }
            }
        }

        tracing::info!("Refresh worker stopped");
    }
}

/// Run one task with retries. Each attempt runs on its own tokio task so a
/// panicking refresh counts as a failed attempt instead of killing the worker.
/// The attempt is aborted together with this future.
async fn execute(
    provider: Arc<WeatherProvider>,
    policy: RetryPolicy,
    limit: Arc<Semaphore>,
    queued: QueuedTask,
) -> Option<WeatherData> {
    let task = queued.task;

    let result = with_retry(&policy, |_| {
        let provider = provider.clone();
        let limit = limit.clone();
        async move {
            let _permit = limit
                .acquire_owned()
                .await
                .map_err(|e| WeatherError::Task(e.to_string()))?;
            AbortOnDropHandle::new(tokio::spawn(async move { task.handle(&provider).await }))
                .await
                .map_err(|e| WeatherError::Task(e.to_string()))
        }
    })
    .await;

    match result {
        Ok(data) => data,
        Err(e) => {
            tracing::error!(
                "Dropping refresh for {}, {} after {} attempts: {}",
                task.lat,
                task.lon,
                policy.max_attempts,
                e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    use serde_json::json;
    use skycache_core::{WeatherConfig, WeatherDriver};
    use tokio::sync::broadcast;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::cache::{cache_key, CacheStore, MemoryCache};
    use crate::context::ProviderContext;
    use crate::http::HttpClient;
    use crate::notify::BroadcastSink;
    use crate::task::{ChannelScheduler, RefreshTask};

    /// Cache whose writes panic, so every refresh attempt dies mid-flight.
    #[derive(Default)]
    struct PanickingCache {
        writes: AtomicU32,
    }

    impl CacheStore for PanickingCache {
        fn get(&self, _key: &str) -> Option<WeatherData> {
            None
        }

        fn put(&self, _key: &str, _value: WeatherData, _ttl: Duration) {
            self.writes.fetch_add(1, Ordering::SeqCst);
            panic!("cache backend unavailable");
        }
    }

    async fn mount_weather(server: &MockServer, delay: Duration) {
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "main": { "temp": 20.0 },
                        "weather": [{ "description": "clear sky", "icon": "01d" }]
                    }))
                    .set_delay(delay),
            )
            .mount(server)
            .await;
    }

    fn provider_for(
        server: &MockServer,
        cache: Arc<dyn CacheStore>,
        sink: Arc<BroadcastSink>,
    ) -> Arc<WeatherProvider> {
        let mut config = WeatherConfig {
            driver: WeatherDriver::OpenWeather,
            ..Default::default()
        };
        config.providers.openweather.endpoint = Some(server.uri());
        let (scheduler, _rx) = ChannelScheduler::new();

        let ctx = ProviderContext::new(
            HttpClient::new().unwrap(),
            cache,
            Arc::new(scheduler),
            sink,
            Arc::new(config),
        );
        Arc::new(WeatherProvider::from_context(ctx).unwrap())
    }

    fn queued(lat: f64, lon: f64) -> QueuedTask {
        QueuedTask {
            task: RefreshTask::new(lat, lon),
            queue: "default".to_string(),
        }
    }

    #[tokio::test]
    async fn test_drains_queue_when_channel_closes() {
        let server = MockServer::start().await;
        mount_weather(&server, Duration::ZERO).await;
        let cache = Arc::new(MemoryCache::new());
        let provider = provider_for(&server, cache.clone(), Arc::new(BroadcastSink::default()));

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(queued(1.0, 2.0)).unwrap();
        tx.send(queued(3.0, 4.0)).unwrap();
        drop(tx);

        RefreshWorker::new(rx, provider, RetryPolicy::default(), 4)
            .run(CancellationToken::new())
            .await;

        assert!(cache.get(&cache_key("openweather", 1.0, 2.0)).is_some());
        assert!(cache.get(&cache_key("openweather", 3.0, 4.0)).is_some());
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_panicking_refresh_is_retried_then_dropped() {
        let server = MockServer::start().await;
        mount_weather(&server, Duration::ZERO).await;
        let cache = Arc::new(PanickingCache::default());
        let provider = provider_for(&server, cache.clone(), Arc::new(BroadcastSink::default()));

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(queued(1.0, 2.0)).unwrap();
        drop(tx);

        let policy = RetryPolicy::new(3, vec![Duration::from_millis(10)]);
        RefreshWorker::new(rx, provider, policy, 1)
            .run(CancellationToken::new())
            .await;

        assert_eq!(cache.writes.load(Ordering::SeqCst), 3);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrency_limit_serializes_refreshes() {
        let server = MockServer::start().await;
        mount_weather(&server, Duration::from_millis(300)).await;
        let cache = Arc::new(MemoryCache::new());
        let provider = provider_for(&server, cache.clone(), Arc::new(BroadcastSink::default()));

        let (tx, rx) = mpsc::unbounded_channel();
        for i in 0..3 {
            tx.send(queued(f64::from(i), 0.0)).unwrap();
        }
        drop(tx);

        let started = Instant::now();
        RefreshWorker::new(rx, provider, RetryPolicy::default(), 1)
            .run(CancellationToken::new())
            .await;

        assert!(started.elapsed() >= Duration::from_millis(900));
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_refresh() {
        let server = MockServer::start().await;
        mount_weather(&server, Duration::from_millis(800)).await;
        let cache = Arc::new(MemoryCache::new());
        let sink = Arc::new(BroadcastSink::default());
        let mut updates = sink.subscribe();
        let provider = provider_for(&server, cache.clone(), sink);

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let worker = RefreshWorker::new(rx, provider, RetryPolicy::default(), 4).spawn(cancel.clone());

        tx.send(queued(1.0, 2.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        worker.await.unwrap();

        // Outlive the upstream delay: nothing may land after shutdown
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(cache.is_empty());
        assert!(matches!(
            updates.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
        drop(tx);
    }
}
