//! Update notifications emitted after every refresh.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::types::{ErrorInfo, WeatherData};

/// External event sink (websocket broadcaster, pub/sub bridge, ...).
pub trait NotificationSink: Send + Sync {
    fn publish(&self, channel: &str, event: &str, payload: Value);
}

/// Weather for a location was refreshed, or the refresh failed.
///
/// Exactly one of `weather` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherUpdated {
    pub lat: f64,
    pub lon: f64,
    weather: Option<WeatherData>,
    error: Option<ErrorInfo>,
}

impl WeatherUpdated {
    pub const CHANNEL: &'static str = "weather";
    pub const EVENT: &'static str = "WeatherUpdated";

    pub fn updated(lat: f64, lon: f64, weather: WeatherData) -> Self {
        Self {
            lat,
            lon,
            weather: Some(weather),
            error: None,
        }
    }

    pub fn failed(lat: f64, lon: f64, error: ErrorInfo) -> Self {
        Self {
            lat,
            lon,
            weather: None,
            error: Some(error),
        }
    }

    pub fn weather(&self) -> Option<&WeatherData> {
        self.weather.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    /// `{lat, lon, weather, error}` as sent to the sink.
    pub fn payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize weather update: {}", e);
            Value::Null
        })
    }

    pub fn publish_to(&self, sink: &dyn NotificationSink) {
        sink.publish(Self::CHANNEL, Self::EVENT, self.payload());
    }
}

/// Message delivered to [`BroadcastSink`] subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub channel: String,
    pub event: String,
    pub payload: Value,
}

/// In-process fan-out over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl NotificationSink for BroadcastSink {
    fn publish(&self, channel: &str, event: &str, payload: Value) {
        let notification = Notification {
            channel: channel.to_string(),
            event: event.to_string(),
            payload,
        };

        // No subscribers is fine: nobody is listening for this location
        if self.tx.send(notification).is_err() {
            tracing::trace!("No subscribers for {} on channel {}", event, channel);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use chrono::Utc;

    use crate::types::Conditions;

    fn reading() -> WeatherData {
        WeatherData::from_conditions(
            "openweather",
            Utc::now(),
            Conditions {
                temp_c: 20.0,
                feels_like_c: 20.0,
                condition: "clear sky".into(),
                icon_url: None,
                wind_kph: 5.0,
                humidity: 40,
            },
        )
    }

    #[test]
    fn test_updated_payload() {
        let event = WeatherUpdated::updated(40.7128, -74.006, reading());
        let payload = event.payload();

        assert_eq!(payload["lat"], 40.7128);
        assert_eq!(payload["lon"], -74.006);
        assert_eq!(payload["weather"]["tempC"], 20.0);
        assert!(payload["error"].is_null());
    }

    #[test]
    fn test_failed_payload() {
        let event = WeatherUpdated::failed(1.0, 2.0, ErrorInfo::new(401, "Invalid API key"));
        let payload = event.payload();

        assert!(payload["weather"].is_null());
        assert_eq!(payload["error"]["code"], 401);
        assert_eq!(payload["error"]["message"], "Invalid API key");
    }

    #[tokio::test]
    async fn test_broadcast_delivery() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();

        WeatherUpdated::updated(1.0, 2.0, reading()).publish_to(&sink);

        let notification = rx.recv().await.unwrap();
        assert_eq!(notification.channel, "weather");
        assert_eq!(notification.event, "WeatherUpdated");
        assert_eq!(notification.payload["lat"], 1.0);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let sink = BroadcastSink::default();
        sink.publish("weather", "WeatherUpdated", Value::Null);
    }
}
