pub mod config;
pub mod error;

pub use config::{
    Config, LocationConfig, ProviderConfig, ProvidersConfig, ValidationResult, WarmConfig,
    WeatherConfig, WeatherDriver, WorkerConfig, DEFAULT_TTL_SECS,
};
pub use error::{AppError, ConfigError, NetworkError, ReqwestErrorExt, WeatherError};

use anyhow::Result;

/// Initialize logging for skycache binaries
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("skycache core initialized");
    Ok(())
}
