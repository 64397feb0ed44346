use std::sync::Arc;

use skycache_core::{AppError, Config};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::{MemoryCache, PURGE_INTERVAL};
use crate::context::ProviderContext;
use crate::http::HttpClient;
use crate::notify::{BroadcastSink, Notification};
use crate::provider::WeatherProvider;
use crate::retry::RetryPolicy;
use crate::task::ChannelScheduler;
use crate::types::WeatherView;
use crate::warm::{CacheWarmer, StaticLocations, WarmSummary};
use crate::worker::RefreshWorker;

/// Wires the provider, its collaborators and the refresh worker together
pub struct App {
    config: Arc<Config>,
    provider: Arc<WeatherProvider>,
    cache: Arc<MemoryCache>,
    notifier: Arc<BroadcastSink>,
    warmer: CacheWarmer,
    worker: Option<RefreshWorker>,
}

impl App {
    /// Build every component from configuration.
    ///
    /// The worker is created but idle until [`App::start`].
    pub fn new(config: Config) -> Result<Self, AppError> {
        let config = Arc::new(config);
        let http = HttpClient::new()?;
        let cache = Arc::new(MemoryCache::new());
        let notifier = Arc::new(BroadcastSink::default());
        let (scheduler, rx) = ChannelScheduler::new();
        let scheduler = Arc::new(scheduler);

        let ctx = ProviderContext::new(
            http,
            cache.clone(),
            scheduler.clone(),
            notifier.clone(),
            Arc::new(config.weather.clone()),
        )
        .with_queue(config.worker.queue.clone());

        let provider = Arc::new(WeatherProvider::from_context(ctx)?);
        let warmer = CacheWarmer::new(scheduler, config.warm.chunk_size)
            .with_queue(config.worker.queue.clone());
        let worker = RefreshWorker::new(
            rx,
            provider.clone(),
            RetryPolicy::from_config(&config.worker),
            config.worker.concurrency,
        );

        Ok(Self {
            config,
            provider,
            cache,
            notifier,
            warmer,
            worker: Some(worker),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provider(&self) -> &WeatherProvider {
        &self.provider
    }

    pub fn cache(&self) -> &MemoryCache {
        &self.cache
    }

    /// Receive every `WeatherUpdated` event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    pub fn view(&self, lat: f64, lon: f64) -> WeatherView {
        self.provider.view(lat, lon)
    }

    /// Queue refreshes for every configured location.
    pub fn warm_cache(&self) -> anyhow::Result<WarmSummary> {
        let source = StaticLocations::from_config(&self.config.locations);
        self.warmer.warm(&source)
    }

    /// Start the refresh worker and the cache purge, both stopped by
    /// `cancel`. Returns `None` if already started.
    pub fn start(&mut self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        let worker = self.worker.take()?;
        self.cache.clone().spawn_purge(PURGE_INTERVAL, cancel.clone());
        Some(worker.spawn(cancel))
    }
}
