use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Code carried by the placeholder returned while a refresh is pending.
pub const STATUS_FETCHING: u16 = 102;

/// Code for failures that never produced an HTTP status.
pub const STATUS_NO_RESPONSE: u16 = 0;

pub const FETCHING_MESSAGE: &str = "Fetching weather (async)…";
pub const TRANSPORT_ERROR_MESSAGE: &str = "Transport error contacting weather service";
pub const UNEXPECTED_ERROR_MESSAGE: &str = "Unexpected error";

/// Error pair attached to a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: u16,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// True for the synthetic "still loading" state.
    pub fn is_fetching(&self) -> bool {
        self.code == STATUS_FETCHING
    }
}

/// Readings in the common unit set, as produced by a transformer.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditions {
    pub temp_c: f64,
    pub feels_like_c: f64,
    pub condition: String,
    pub icon_url: Option<String>,
    pub wind_kph: f64,
    pub humidity: i32,
}

/// Normalized current weather for one location.
///
/// Either real data (`has_error() == false`) or an error placeholder with
/// zeroed readings and `condition == "unknown"`. Readings of a placeholder
/// carry no meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherData {
    pub temp_c: f64,
    pub temp_f: f64,
    pub condition: String,
    pub icon_url: Option<String>,
    pub wind_kph: f64,
    pub humidity: i32,
    pub feels_like_c: f64,
    pub feels_like_f: f64,
    /// Provider id
    pub source: String,
    pub observed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
}

impl WeatherData {
    /// Build real weather data; Fahrenheit values are derived from Celsius.
    pub fn from_conditions(
        source: impl Into<String>,
        observed_at: DateTime<Utc>,
        conditions: Conditions,
    ) -> Self {
        Self {
            temp_c: conditions.temp_c,
            temp_f: celsius_to_fahrenheit(conditions.temp_c),
            condition: conditions.condition,
            icon_url: conditions.icon_url,
            wind_kph: conditions.wind_kph,
            humidity: conditions.humidity,
            feels_like_c: conditions.feels_like_c,
            feels_like_f: celsius_to_fahrenheit(conditions.feels_like_c),
            source: source.into(),
            observed_at,
            error: None,
        }
    }

    /// Build an error placeholder stamped with the current time.
    pub fn placeholder(source: impl Into<String>, error: ErrorInfo) -> Self {
        Self {
            temp_c: 0.0,
            temp_f: celsius_to_fahrenheit(0.0),
            condition: "unknown".to_string(),
            icon_url: None,
            wind_kph: 0.0,
            humidity: 0,
            feels_like_c: 0.0,
            feels_like_f: celsius_to_fahrenheit(0.0),
            source: source.into(),
            observed_at: Utc::now(),
            error: Some(error),
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }
}

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

/// Response pair handed to API consumers: exactly one side is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherView {
    pub weather: Option<WeatherData>,
    pub error: Option<ErrorInfo>,
}

impl From<WeatherData> for WeatherView {
    fn from(data: WeatherData) -> Self {
        match data.error.clone() {
            Some(error) => Self {
                weather: None,
                error: Some(error),
            },
            None => Self {
                weather: Some(data),
                error: None,
            },
        }
    }
}
