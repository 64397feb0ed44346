//! Transformers from upstream payloads to [`WeatherData`].
//!
//! Each upstream API gets one transformer. Payloads arrive as JSON with a
//! `source` field injected by the calling provider; missing optional fields
//! fall back to zero, `"unknown"` or `None`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use skycache_core::WeatherError;

use crate::types::{Conditions, WeatherData};

const OPENWEATHER_ICON_BASE: &str = "https://openweathermap.org/img/wn";

/// Maps one upstream payload shape into normalized weather data.
pub trait WeatherTransformer: Send + Sync {
    /// # Errors
    /// Returns [`WeatherError::Parse`] when the payload does not match the
    /// upstream schema or lacks the injected `source`.
    fn transform(&self, payload: Value) -> Result<WeatherData, WeatherError>;
}

pub fn ms_to_kph(speed: f64) -> f64 {
    speed * 3.6
}

/// Turn an icon reference into an absolute https URL.
///
/// Accepts absolute URLs, scheme-relative paths (`//cdn...`) and bare
/// host paths.
pub fn absolute_icon_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with("https://") || raw.starts_with("http://") {
        return Some(raw.to_string());
    }
    if let Some(rest) = raw.strip_prefix("//") {
        return Some(format!("https://{}", rest));
    }
    Some(format!("https://{}", raw.trim_start_matches('/')))
}

fn observed_at(epoch: Option<i64>) -> DateTime<Utc> {
    epoch
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now)
}

// OpenWeather current weather: https://openweathermap.org/current

#[derive(Debug, Deserialize)]
struct OpenWeatherPayload {
    main: Option<OpenWeatherMain>,
    wind: Option<OpenWeatherWind>,
    weather: Option<Vec<OpenWeatherCondition>>,
    dt: Option<i64>,
    source: String,
}

#[derive(Debug, Deserialize)]
struct OpenWeatherMain {
    temp: Option<f64>,
    feels_like: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OpenWeatherWind {
    /// metres per second with `units=metric`
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OpenWeatherCondition {
    description: Option<String>,
    icon: Option<String>,
}

/// Transformer for `api.openweathermap.org/data/2.5/weather` (metric units).
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenWeatherTransformer;

impl WeatherTransformer for OpenWeatherTransformer {
    fn transform(&self, payload: Value) -> Result<WeatherData, WeatherError> {
        let payload: OpenWeatherPayload = serde_json::from_value(payload)?;

        let main = payload.main.as_ref();
        let temp_c = main.and_then(|m| m.temp).unwrap_or(0.0);
        let feels_like_c = main.and_then(|m| m.feels_like).unwrap_or(temp_c);
        let humidity = main.and_then(|m| m.humidity).unwrap_or(0.0) as i32;
        let wind_ms = payload.wind.as_ref().and_then(|w| w.speed).unwrap_or(0.0);

        let first = payload.weather.as_ref().and_then(|w| w.first());
        let condition = first
            .and_then(|c| c.description.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let icon_url = first
            .and_then(|c| c.icon.as_deref())
            .filter(|code| !code.is_empty())
            .and_then(|code| {
                if code.contains('/') {
                    absolute_icon_url(code)
                } else {
                    Some(format!("{}/{}@2x.png", OPENWEATHER_ICON_BASE, code))
                }
            });

        Ok(WeatherData::from_conditions(
            payload.source,
            observed_at(payload.dt),
            Conditions {
                temp_c,
                feels_like_c,
                condition,
                icon_url,
                wind_kph: ms_to_kph(wind_ms),
                humidity,
            },
        ))
    }
}

// WeatherAPI current: https://www.weatherapi.com/docs/#apis-realtime

#[derive(Debug, Deserialize)]
struct WeatherApiPayload {
    current: Option<WeatherApiCurrent>,
    source: String,
}

#[derive(Debug, Deserialize)]
struct WeatherApiCurrent {
    temp_c: Option<f64>,
    feelslike_c: Option<f64>,
    wind_kph: Option<f64>,
    humidity: Option<f64>,
    condition: Option<WeatherApiCondition>,
    last_updated_epoch: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WeatherApiCondition {
    text: Option<String>,
    /// Scheme-relative, e.g. `//cdn.weatherapi.com/weather/64x64/day/113.png`
    icon: Option<String>,
}

/// Transformer for `api.weatherapi.com/v1/current.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeatherApiTransformer;

impl WeatherTransformer for WeatherApiTransformer {
    fn transform(&self, payload: Value) -> Result<WeatherData, WeatherError> {
        let payload: WeatherApiPayload = serde_json::from_value(payload)?;

        let current = payload.current.as_ref();
        let temp_c = current.and_then(|c| c.temp_c).unwrap_or(0.0);
        let feels_like_c = current.and_then(|c| c.feelslike_c).unwrap_or(temp_c);
        let wind_kph = current.and_then(|c| c.wind_kph).unwrap_or(0.0);
        let humidity = current.and_then(|c| c.humidity).unwrap_or(0.0) as i32;

        let condition = current.and_then(|c| c.condition.as_ref());
        let text = condition
            .and_then(|c| c.text.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let icon_url = condition
            .and_then(|c| c.icon.as_deref())
            .and_then(absolute_icon_url);

        Ok(WeatherData::from_conditions(
            payload.source,
            observed_at(current.and_then(|c| c.last_updated_epoch)),
            Conditions {
                temp_c,
                feels_like_c,
                condition: text,
                icon_url,
                wind_kph,
                humidity,
            },
        ))
    }
}
