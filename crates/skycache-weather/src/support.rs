//! Error handling shared by every provider: message extraction from
//! upstream error bodies, placeholder construction and failure
//! classification.

use serde_json::Value;
use skycache_core::{NetworkError, WeatherError};

use crate::types::{
    ErrorInfo, WeatherData, STATUS_NO_RESPONSE, TRANSPORT_ERROR_MESSAGE, UNEXPECTED_ERROR_MESSAGE,
};

/// Pull a readable message out of an upstream error body.
///
/// Tries `error.message` (WeatherAPI style), then a top-level `message`
/// (OpenWeather style), then `fallback`. Never fails.
pub fn parse_error_message(body: Option<&str>, fallback: &str) -> String {
    let Some(raw) = body.filter(|b| !b.trim().is_empty()) else {
        return fallback.to_string();
    };

    let Ok(decoded) = serde_json::from_str::<Value>(raw) else {
        return fallback.to_string();
    };

    decoded
        .pointer("/error/message")
        .and_then(scalar_to_string)
        .or_else(|| decoded.get("message").and_then(scalar_to_string))
        .unwrap_or_else(|| fallback.to_string())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn build_error_placeholder(source: &str, code: u16, message: impl Into<String>) -> WeatherData {
    WeatherData::placeholder(source, ErrorInfo::new(code, message))
}

/// Why a refresh produced no data.
///
/// Upstream HTTP errors arrive as [`WeatherError::Upstream`]; every other
/// weather error is unexpected.
#[derive(Debug, thiserror::Error)]
pub(crate) enum RefreshFailure {
    #[error("transport error: {0}")]
    Transport(#[from] NetworkError),

    #[error(transparent)]
    Weather(#[from] WeatherError),
}

impl RefreshFailure {
    pub(crate) fn code(&self) -> u16 {
        match self {
            Self::Weather(WeatherError::Upstream { status, .. }) => *status,
            Self::Transport(_) | Self::Weather(_) => STATUS_NO_RESPONSE,
        }
    }

    /// Message stored in the cached placeholder and broadcast to clients.
    pub(crate) fn public_message(&self) -> String {
        match self {
            Self::Weather(WeatherError::Upstream { message, .. }) => message.clone(),
            Self::Transport(_) => TRANSPORT_ERROR_MESSAGE.to_string(),
            Self::Weather(_) => UNEXPECTED_ERROR_MESSAGE.to_string(),
        }
    }

    pub(crate) fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo::new(self.code(), self.public_message())
    }
}
