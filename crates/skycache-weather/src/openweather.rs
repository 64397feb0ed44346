//! OpenWeather current-weather provider.

use crate::context::{ProviderContext, UpstreamRequest};
use crate::transform::OpenWeatherTransformer;
use crate::types::WeatherData;

pub const OPENWEATHER_ID: &str = "openweather";
pub const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Clone)]
pub struct OpenWeatherService {
    ctx: ProviderContext,
    api_key: Option<String>,
    endpoint: String,
    transformer: OpenWeatherTransformer,
}

impl OpenWeatherService {
    pub fn new(ctx: ProviderContext, api_key: Option<String>) -> Self {
        Self {
            ctx,
            api_key,
            endpoint: OPENWEATHER_URL.to_string(),
            transformer: OpenWeatherTransformer,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn id(&self) -> &'static str {
        OPENWEATHER_ID
    }

    /// Serve cached data immediately; on miss, queue a refresh and return a placeholder.
    pub fn current(&self, lat: f64, lon: f64) -> WeatherData {
        self.ctx.serve_cached(OPENWEATHER_ID, lat, lon)
    }

    /// Perform the upstream request and populate the cache. Used by the worker.
    pub async fn refresh_now(&self, lat: f64, lon: f64) -> Option<WeatherData> {
        let mut query = vec![
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("units", "metric".to_string()),
        ];
        if let Some(key) = &self.api_key {
            query.push(("appid", key.clone()));
        }

        let request = UpstreamRequest {
            provider_id: OPENWEATHER_ID,
            label: "OpenWeather",
            url: &self.endpoint,
            query,
        };
        self.ctx.refresh(request, &self.transformer, lat, lon).await
    }
}
