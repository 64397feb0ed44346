//! Cache store for normalized weather data.
//!
//! Every entry carries its own TTL so real data and short-lived error
//! placeholders share one store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::types::{ErrorInfo, WeatherData};

/// Lifetime of a cached error placeholder.
pub const ERROR_TTL: Duration = Duration::from_secs(60);

/// How often [`MemoryCache::spawn_purge`] sweeps expired entries.
pub const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Shared store consulted by the read path and written by refreshes.
///
/// Implementations must tolerate concurrent `get`/`put`; the last writer wins.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<WeatherData>;

    fn put(&self, key: &str, value: WeatherData, ttl: Duration);
}

/// Cache key for a provider and coordinate pair, fixed at 6 decimals.
pub fn cache_key(provider_id: &str, lat: f64, lon: f64) -> String {
    format!("{}:{}:{}", provider_id, fixed6(lat), fixed6(lon))
}

fn fixed6(value: f64) -> String {
    let formatted = format!("{:.6}", value);
    // -0.0000001 and 0.0000001 must land on the same key
    if formatted == "-0.000000" {
        "0.000000".to_string()
    } else {
        formatted
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: WeatherData,
    expires_at: Instant,
}

/// Process-local cache with per-entry expiry.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!("Purged {} expired weather cache entries", removed);
        }
        removed
    }

    /// Sweep expired entries every `every` until `cancel` fires.
    ///
    /// Expiry on read never frees memory, so a long-running process needs
    /// this to bound the map to live keys.
    pub fn spawn_purge(
        self: Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.purge_expired();
                    }
                }
            }
            tracing::debug!("Weather cache purge stopped");
        })
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<WeatherData> {
        let entries = self.entries.read();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                tracing::debug!("Cache entry expired for key: {}", key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: &str, value: WeatherData, ttl: Duration) {
        if value.error().is_some_and(ErrorInfo::is_fetching) {
            tracing::trace!("Not caching fetching placeholder for {}", key);
            return;
        }
        let expires_at = Instant::now() + ttl;
        self.entries.write().insert(
            key.to_string(),
            CacheEntry { value, expires_at },
        );
    }
}
