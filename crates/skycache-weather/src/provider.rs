//! The active weather provider.
//!
//! A closed set of upstream implementations selected once from
//! configuration, mirroring the `weather.driver` setting.

use skycache_core::{WeatherDriver, WeatherError};

use crate::context::ProviderContext;
use crate::openweather::OpenWeatherService;
use crate::types::{WeatherData, WeatherView};
use crate::weatherapi::WeatherApiService;

#[derive(Clone)]
pub enum WeatherProvider {
    OpenWeather(OpenWeatherService),
    WeatherApi(WeatherApiService),
}

impl WeatherProvider {
    /// Build the provider named by `weather.driver`.
    ///
    /// Unknown drivers fall back to OpenWeather without an API key.
    ///
    /// # Errors
    /// Returns [`WeatherError::UnsupportedProvider`] for `nws`, which is
    /// reserved but not implemented.
    pub fn from_context(ctx: ProviderContext) -> Result<Self, WeatherError> {
        let config = ctx.config();
        let settings = |id: &str| config.provider(id).cloned().unwrap_or_default();

        let provider = match config.driver {
            WeatherDriver::OpenWeather => {
                let settings = settings("openweather");
                let service = OpenWeatherService::new(ctx.clone(), settings.key);
                Self::OpenWeather(match settings.endpoint {
                    Some(endpoint) => service.with_endpoint(endpoint),
                    None => service,
                })
            }
            WeatherDriver::WeatherApi => {
                let settings = settings("weatherapi");
                let service = WeatherApiService::new(ctx.clone(), settings.key);
                Self::WeatherApi(match settings.endpoint {
                    Some(endpoint) => service.with_endpoint(endpoint),
                    None => service,
                })
            }
            WeatherDriver::Nws => {
                return Err(WeatherError::UnsupportedProvider(
                    WeatherDriver::Nws.as_str().to_string(),
                ));
            }
            WeatherDriver::Unknown => {
                tracing::warn!("Unknown weather driver, falling back to openweather");
                let service = OpenWeatherService::new(ctx.clone(), None);
                Self::OpenWeather(match settings("openweather").endpoint {
                    Some(endpoint) => service.with_endpoint(endpoint),
                    None => service,
                })
            }
        };

        tracing::info!("Weather provider selected: {}", provider.id());
        Ok(provider)
    }

    /// Short provider id: `openweather` or `weatherapi`.
    pub fn id(&self) -> &'static str {
        match self {
            Self::OpenWeather(p) => p.id(),
            Self::WeatherApi(p) => p.id(),
        }
    }

    /// Cached weather for a location, or a "fetching" placeholder.
    ///
    /// Never performs network I/O.
    pub fn current(&self, lat: f64, lon: f64) -> WeatherData {
        match self {
            Self::OpenWeather(p) => p.current(lat, lon),
            Self::WeatherApi(p) => p.current(lat, lon),
        }
    }

    /// Fetch from upstream now, updating cache and subscribers.
    ///
    /// Returns `None` when the refresh failed; the failure is cached and
    /// broadcast rather than returned.
    pub async fn refresh_now(&self, lat: f64, lon: f64) -> Option<WeatherData> {
        match self {
            Self::OpenWeather(p) => p.refresh_now(lat, lon).await,
            Self::WeatherApi(p) => p.refresh_now(lat, lon).await,
        }
    }

    /// `current` shaped as the `{weather, error}` response pair.
    pub fn view(&self, lat: f64, lon: f64) -> WeatherView {
        self.current(lat, lon).into()
    }
}
