//! Collaborators shared by every provider, plus the cache-aside read path
//! and the refresh pipeline they all run.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use skycache_core::{ReqwestErrorExt, WeatherConfig, WeatherError};

use crate::cache::{cache_key, CacheStore, ERROR_TTL};
use crate::http::HttpClient;
use crate::notify::{NotificationSink, WeatherUpdated};
use crate::support::{build_error_placeholder, parse_error_message, RefreshFailure};
use crate::task::{RefreshScheduler, RefreshTask, DEFAULT_QUEUE};
use crate::transform::WeatherTransformer;
use crate::types::{ErrorInfo, WeatherData, FETCHING_MESSAGE, STATUS_FETCHING};

/// Everything a provider needs besides its own endpoint and transformer.
#[derive(Clone)]
pub struct ProviderContext {
    http: HttpClient,
    cache: Arc<dyn CacheStore>,
    scheduler: Arc<dyn RefreshScheduler>,
    notifier: Arc<dyn NotificationSink>,
    config: Arc<WeatherConfig>,
    queue: String,
}

/// One upstream call as described by a provider.
pub(crate) struct UpstreamRequest<'a> {
    pub provider_id: &'static str,
    /// Human name used in logs and fallback messages
    pub label: &'static str,
    pub url: &'a str,
    pub query: Vec<(&'static str, String)>,
}

impl ProviderContext {
    pub fn new(
        http: HttpClient,
        cache: Arc<dyn CacheStore>,
        scheduler: Arc<dyn RefreshScheduler>,
        notifier: Arc<dyn NotificationSink>,
        config: Arc<WeatherConfig>,
    ) -> Self {
        Self {
            http,
            cache,
            scheduler,
            notifier,
            config,
            queue: DEFAULT_QUEUE.to_string(),
        }
    }

    /// Schedule refresh tasks onto `queue` instead of the default one.
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn config(&self) -> &WeatherConfig {
        &self.config
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.config.ttl_seconds())
    }

    /// Read path: cached value, or schedule a refresh and hand back an
    /// uncached "fetching" placeholder. Never touches the network.
    pub(crate) fn serve_cached(&self, provider_id: &str, lat: f64, lon: f64) -> WeatherData {
        let key = cache_key(provider_id, lat, lon);

        if let Some(cached) = self.cache.get(&key) {
            tracing::trace!("Cache hit for {}", key);
            return cached;
        }

        tracing::debug!("Cache miss for {}, scheduling refresh", key);
        self.scheduler.schedule(RefreshTask::new(lat, lon), &self.queue);

        build_error_placeholder(provider_id, STATUS_FETCHING, FETCHING_MESSAGE)
    }

    /// Write path: fetch, classify, cache and notify. Every failure is
    /// absorbed; `None` means an error placeholder was cached instead.
    pub(crate) async fn refresh<T: WeatherTransformer>(
        &self,
        request: UpstreamRequest<'_>,
        transformer: &T,
        lat: f64,
        lon: f64,
    ) -> Option<WeatherData> {
        let key = cache_key(request.provider_id, lat, lon);
        let ttl = self.ttl();

        match self.fetch(&request, transformer).await {
            Ok(data) => {
                tracing::debug!(
                    provider = request.provider_id,
                    lat,
                    lon,
                    "{} refresh succeeded",
                    request.label
                );
                self.cache.put(&key, data.clone(), ttl);
                WeatherUpdated::updated(lat, lon, data.clone()).publish_to(self.notifier.as_ref());
                Some(data)
            }
            Err(failure) => {
                self.log_failure(&request, &failure, lat, lon);
                let error = failure.to_error_info();
                self.store_failure(&key, request.provider_id, &error);
                WeatherUpdated::failed(lat, lon, error).publish_to(self.notifier.as_ref());
                None
            }
        }
    }

    async fn fetch<T: WeatherTransformer>(
        &self,
        request: &UpstreamRequest<'_>,
        transformer: &T,
    ) -> Result<WeatherData, RefreshFailure> {
        let response = self
            .http
            .get(request.url, &request.query)
            .await
            .map_err(|e| RefreshFailure::Transport(e.into_network_error()))?;

        if response.is_error() {
            let fallback = format!("{} error", request.label);
            return Err(WeatherError::Upstream {
                status: response.status,
                message: parse_error_message(Some(&response.body), &fallback),
            }
            .into());
        }

        let mut payload: Value = serde_json::from_str(&response.body).map_err(WeatherError::from)?;
        match payload.as_object_mut() {
            Some(fields) => {
                fields.insert(
                    "source".to_string(),
                    Value::String(request.provider_id.to_string()),
                );
            }
            None => {
                return Err(WeatherError::Parse("payload is not a JSON object".to_string()).into());
            }
        }

        Ok(transformer.transform(payload)?)
    }

    /// Cache a placeholder briefly so a failing upstream is not hammered.
    fn store_failure(&self, key: &str, provider_id: &str, error: &ErrorInfo) {
        let placeholder = build_error_placeholder(provider_id, error.code, error.message.clone());
        self.cache.put(key, placeholder, ERROR_TTL);
    }

    fn log_failure(&self, request: &UpstreamRequest<'_>, failure: &RefreshFailure, lat: f64, lon: f64) {
        match failure {
            RefreshFailure::Weather(WeatherError::Upstream { status, message }) => tracing::warn!(
                provider = request.provider_id,
                lat,
                lon,
                status,
                message = %message,
                "{} HTTP error",
                request.label
            ),
            RefreshFailure::Transport(e) => tracing::error!(
                provider = request.provider_id,
                lat,
                lon,
                message = %e,
                "{} transport error",
                request.label
            ),
            RefreshFailure::Weather(e) => tracing::error!(
                provider = request.provider_id,
                lat,
                lon,
                message = %e,
                "{} unexpected error",
                request.label
            ),
        }
    }
}
