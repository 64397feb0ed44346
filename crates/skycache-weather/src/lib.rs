//! Cache-aside current weather for skycache
//!
//! Reads are served from cache only. A miss schedules a background refresh
//! and returns a "fetching" placeholder; the refresh fetches from the active
//! upstream provider, caches the result (or a short-lived error) and
//! publishes a `WeatherUpdated` notification.

pub mod app;
pub mod cache;
pub mod context;
pub mod http;
pub mod notify;
pub mod openweather;
pub mod provider;
pub mod retry;
mod support;
pub mod task;
pub mod transform;
pub mod types;
pub mod warm;
pub mod weatherapi;
pub mod worker;

pub use app::App;
pub use cache::{cache_key, CacheStore, MemoryCache, ERROR_TTL};
pub use context::ProviderContext;
pub use http::{HttpClient, HttpResponse, UPSTREAM_TIMEOUT};
pub use notify::{BroadcastSink, Notification, NotificationSink, WeatherUpdated};
pub use openweather::OpenWeatherService;
pub use provider::WeatherProvider;
pub use retry::RetryPolicy;
pub use support::{build_error_placeholder, parse_error_message};
pub use task::{ChannelScheduler, QueuedTask, RefreshScheduler, RefreshTask};
pub use transform::{OpenWeatherTransformer, WeatherApiTransformer, WeatherTransformer};
pub use types::*;
pub use warm::{CacheWarmer, KnownLocation, LocationSource, StaticLocations, WarmSummary};
pub use weatherapi::WeatherApiService;
pub use worker::RefreshWorker;
