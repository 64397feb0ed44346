//! WeatherAPI.com realtime provider.

use crate::context::{ProviderContext, UpstreamRequest};
use crate::transform::WeatherApiTransformer;
use crate::types::WeatherData;

pub const WEATHERAPI_ID: &str = "weatherapi";
pub const WEATHERAPI_URL: &str = "https://api.weatherapi.com/v1/current.json";

#[derive(Clone)]
pub struct WeatherApiService {
    ctx: ProviderContext,
    api_key: Option<String>,
    endpoint: String,
    transformer: WeatherApiTransformer,
}

impl WeatherApiService {
    pub fn new(ctx: ProviderContext, api_key: Option<String>) -> Self {
        Self {
            ctx,
            api_key,
            endpoint: WEATHERAPI_URL.to_string(),
            transformer: WeatherApiTransformer,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn id(&self) -> &'static str {
        WEATHERAPI_ID
    }

    /// Serve cached data immediately; on miss, queue a refresh and return a placeholder.
    pub fn current(&self, lat: f64, lon: f64) -> WeatherData {
        self.ctx.serve_cached(WEATHERAPI_ID, lat, lon)
    }

    /// Perform the upstream request and populate the cache. Used by the worker.
    pub async fn refresh_now(&self, lat: f64, lon: f64) -> Option<WeatherData> {
        let mut query = Vec::with_capacity(3);
        if let Some(key) = &self.api_key {
            query.push(("key", key.clone()));
        }
        query.push(("q", format!("{:.6},{:.6}", lat, lon)));
        query.push(("aqi", "no".to_string()));

        let request = UpstreamRequest {
            provider_id: WEATHERAPI_ID,
            label: "WeatherAPI",
            url: &self.endpoint,
            query,
        };
        self.ctx.refresh(request, &self.transformer, lat, lon).await
    }
}
