use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Environment variable pointing at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "SKYCACHE_CONFIG";

/// Default cache lifetime for real weather data, in seconds.
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Provider selection, TTL and upstream credentials
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Background refresh worker settings
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Cache warm-up settings
    #[serde(default)]
    pub warm: WarmConfig,

    /// Known locations used by the built-in location source
    #[serde(default)]
    pub locations: Vec<LocationConfig>,
}

/// Upstream weather driver.
///
/// `nws` is accepted by the parser but has no implementation. File and
/// environment values both go through [`WeatherDriver::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum WeatherDriver {
    OpenWeather,
    #[default]
    WeatherApi,
    Nws,
    Unknown,
}

impl From<String> for WeatherDriver {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl WeatherDriver {
    /// Parse a driver name, mapping anything unrecognized to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "openweather" => Self::OpenWeather,
            "weatherapi" => Self::WeatherApi,
            "nws" => Self::Nws,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenWeather => "openweather",
            Self::WeatherApi => "weatherapi",
            Self::Nws => "nws",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Active provider
    #[serde(default)]
    pub driver: WeatherDriver,

    /// Cache TTL in seconds for successful fetches (default: 3600)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,

    /// Per-provider credentials and endpoint overrides
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl WeatherConfig {
    /// Effective TTL for real weather data.
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl.unwrap_or(DEFAULT_TTL_SECS)
    }

    /// Settings for a provider id (`openweather`, `weatherapi`).
    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        match id {
            "openweather" => Some(&self.providers.openweather),
            "weatherapi" => Some(&self.providers.weatherapi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openweather: ProviderConfig,
    #[serde(default)]
    pub weatherapi: ProviderConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key sent with every upstream request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Replaces the provider's public endpoint (proxies, test servers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Queue name refresh tasks are scheduled onto
    #[serde(default = "default_queue")]
    pub queue: String,

    /// Maximum refresh tasks executing at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Attempts per refresh task before it is dropped
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before each retry, in seconds; the last entry repeats
    #[serde(default = "default_backoff_seconds")]
    pub backoff_seconds: Vec<u64>,
}

fn default_queue() -> String {
    "default".to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_seconds() -> Vec<u64> {
    vec![10, 30, 60]
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue: default_queue(),
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            backoff_seconds: default_backoff_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmConfig {
    /// Locations fetched per page while warming (default: 100)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Warm the cache from `locations` at startup
    #[serde(default)]
    pub on_start: bool,
}

fn default_chunk_size() -> usize {
    100
}

impl Default for WarmConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            on_start: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    pub lat: f64,
    pub lon: f64,
}

impl Config {
    /// Load configuration from `$SKYCACHE_CONFIG` or the user config dir,
    /// falling back to defaults, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            tracing::info!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file (no env overrides).
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult), ConfigError> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Apply the deployment environment variables on top of file values.
    ///
    /// `lookup` is usually `std::env::var`; empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(driver) = get("WEATHER_DRIVER") {
            self.weather.driver = WeatherDriver::parse(&driver);
        }

        if let Some(ttl) = get("WEATHER_TTL_SECONDS") {
            let ttl = ttl.trim().parse::<u64>().map_err(|e| {
                ConfigError::Invalid(format!("WEATHER_TTL_SECONDS={}: {}", ttl, e))
            })?;
            self.weather.ttl = Some(ttl);
        }

        if let Some(key) = get("OPENWEATHER_API_KEY") {
            self.weather.providers.openweather.key = Some(key);
        }

        if let Some(key) = get("WEATHERAPI_API_KEY") {
            self.weather.providers.weatherapi.key = Some(key);
        }

        Ok(())
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        match self.weather.driver {
            WeatherDriver::Nws => {
                result.add_error("weather.driver", "Provider 'nws' is not implemented");
            }
            WeatherDriver::Unknown => {
                result.add_warning(
                    "weather.driver",
                    "Unknown driver, falling back to openweather without an API key",
                );
            }
            driver => {
                let has_key = self
                    .weather
                    .provider(driver.as_str())
                    .and_then(|p| p.key.as_deref())
                    .is_some_and(|k| !k.is_empty());
                if !has_key {
                    result.add_warning(
                        format!("weather.providers.{}.key", driver.as_str()),
                        "No API key configured - upstream requests will be rejected",
                    );
                }
            }
        }

        if self.weather.ttl == Some(0) {
            result.add_warning("weather.ttl", "TTL of 0 disables caching of weather data");
        }

        for (id, provider) in [
            ("openweather", &self.weather.providers.openweather),
            ("weatherapi", &self.weather.providers.weatherapi),
        ] {
            if let Some(endpoint) = &provider.endpoint {
                let field = format!("weather.providers.{}.endpoint", id);
                self.validate_url(endpoint, &field, &mut result);
            }
        }

        if self.worker.queue.trim().is_empty() {
            result.add_error("worker.queue", "Queue name must not be empty");
        }
        if self.worker.concurrency == 0 {
            result.add_error("worker.concurrency", "Concurrency must be greater than 0");
        }
        if self.worker.max_attempts == 0 {
            result.add_error("worker.max_attempts", "At least one attempt is required");
        }
        if self.worker.max_attempts > 1 && self.worker.backoff_seconds.is_empty() {
            result.add_warning(
                "worker.backoff_seconds",
                "No backoff configured - retries will run immediately",
            );
        }

        if self.warm.chunk_size == 0 {
            result.add_error("warm.chunk_size", "Chunk size must be greater than 0");
        }
        if self.warm.on_start && self.locations.is_empty() {
            result.add_warning("warm.on_start", "Warm-up enabled but no locations configured");
        }

        for (i, location) in self.locations.iter().enumerate() {
            if !(-90.0..=90.0).contains(&location.lat) || !(-180.0..=180.0).contains(&location.lon)
            {
                result.add_error(
                    format!("locations[{}]", i),
                    format!(
                        "Coordinates out of range: {}, {}",
                        location.lat, location.lon
                    ),
                );
            }
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("user config directory".to_string()))?
            .join("skycache");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn with_key(driver: WeatherDriver) -> Config {
        let mut config = Config::default();
        config.weather.driver = driver;
        config.weather.providers.openweather.key = Some("ow-key".into());
        config.weather.providers.weatherapi.key = Some("wa-key".into());
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.weather.driver, WeatherDriver::WeatherApi);
        assert_eq!(config.weather.ttl_seconds(), 3600);
        assert_eq!(config.worker.queue, "default");
        assert_eq!(config.worker.max_attempts, 3);
        assert_eq!(config.worker.backoff_seconds, vec![10, 30, 60]);
        assert_eq!(config.warm.chunk_size, 100);
    }

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        // Missing API key is only a warning
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.field == "weather.providers.weatherapi.key"));
    }

    #[test]
    fn test_nws_is_rejected() {
        let config = with_key(WeatherDriver::Nws);
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "weather.driver"));
    }

    #[test]
    fn test_unknown_driver_is_warning() {
        let config = Config::from_toml_str("[weather]\ndriver = \"darksky\"\n").unwrap();
        assert_eq!(config.weather.driver, WeatherDriver::Unknown);
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "weather.driver"));
    }

    #[test]
    fn test_driver_in_file_is_case_insensitive() {
        let config = Config::from_toml_str("[weather]\ndriver = \"OpenWeather\"\n").unwrap();
        assert_eq!(config.weather.driver, WeatherDriver::OpenWeather);

        let config = Config::from_toml_str("[weather]\ndriver = \" NWS \"\n").unwrap();
        assert_eq!(config.weather.driver, WeatherDriver::Nws);

        let serialized = toml::to_string(&config.weather).unwrap();
        assert!(serialized.contains("driver = \"nws\""));
    }

    #[test]
    fn test_parse_toml() {
        let config = Config::from_toml_str(
            r#"
            [weather]
            driver = "openweather"
            ttl = 900

            [weather.providers.openweather]
            key = "abc"

            [warm]
            chunk_size = 25

            [[locations]]
            lat = 40.7128
            lon = -74.006
            "#,
        )
        .unwrap();

        assert_eq!(config.weather.driver, WeatherDriver::OpenWeather);
        assert_eq!(config.weather.ttl_seconds(), 900);
        assert_eq!(
            config.weather.provider("openweather").and_then(|p| p.key.as_deref()),
            Some("abc")
        );
        assert_eq!(config.warm.chunk_size, 25);
        assert_eq!(config.locations.len(), 1);
        // Untouched sections keep their defaults
        assert_eq!(config.worker.concurrency, 4);
    }

    #[test]
    fn test_malformed_toml() {
        let err = Config::from_toml_str("[weather\ndriver=").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[weather]\ndriver = \"weatherapi\"\nttl = 120").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.weather.ttl, Some(120));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("WEATHER_DRIVER", "OpenWeather"),
            ("WEATHER_TTL_SECONDS", "600"),
            ("OPENWEATHER_API_KEY", "env-key"),
            ("WEATHERAPI_API_KEY", ""),
        ]);

        let mut config = Config::default();
        config.apply_env(|name| env.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(config.weather.driver, WeatherDriver::OpenWeather);
        assert_eq!(config.weather.ttl, Some(600));
        assert_eq!(config.weather.providers.openweather.key.as_deref(), Some("env-key"));
        // Empty values are ignored
        assert!(config.weather.providers.weatherapi.key.is_none());
    }

    #[test]
    fn test_env_invalid_ttl() {
        let mut config = Config::default();
        let err = config
            .apply_env(|name| (name == "WEATHER_TTL_SECONDS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_invalid_endpoint_scheme() {
        let mut config = with_key(WeatherDriver::OpenWeather);
        config.weather.providers.openweather.endpoint = Some("ftp://localhost:8080".into());
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_chunk_size() {
        let mut config = with_key(WeatherDriver::WeatherApi);
        config.warm.chunk_size = 0;
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "warm.chunk_size"));
    }

    #[test]
    fn test_location_out_of_range() {
        let mut config = with_key(WeatherDriver::WeatherApi);
        config.locations.push(LocationConfig { lat: 95.0, lon: 0.0 });
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "locations[0]"));
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
