//! Proactive cache warming: schedule a refresh for every known location.

use std::sync::Arc;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use skycache_core::LocationConfig;

use crate::task::{RefreshScheduler, RefreshTask, DEFAULT_QUEUE};

/// A location owned by some user, ordered by `id`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KnownLocation {
    pub id: u64,
    pub lat: f64,
    pub lon: f64,
}

/// Paged access to every known location.
///
/// Pages are keyset-paginated on `id`: a page holds up to `limit` entries
/// with `id > after`, in ascending order. An empty page ends the sequence.
pub trait LocationSource {
    /// # Errors
    /// Backend failures (database, file) are passed through.
    fn page(&self, after: Option<u64>, limit: usize) -> Result<Vec<KnownLocation>>;
}

/// In-memory location list.
#[derive(Debug, Clone, Default)]
pub struct StaticLocations {
    locations: Vec<KnownLocation>,
}

impl StaticLocations {
    pub fn new(mut locations: Vec<KnownLocation>) -> Self {
        locations.sort_by_key(|l| l.id);
        Self { locations }
    }

    /// Number configured locations from 1 in file order.
    pub fn from_config(locations: &[LocationConfig]) -> Self {
        Self::new(
            locations
                .iter()
                .zip(1u64..)
                .map(|(l, id)| KnownLocation {
                    id,
                    lat: l.lat,
                    lon: l.lon,
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

impl LocationSource for StaticLocations {
    fn page(&self, after: Option<u64>, limit: usize) -> Result<Vec<KnownLocation>> {
        Ok(self
            .locations
            .iter()
            .filter(|l| after.map_or(true, |a| l.id > a))
            .take(limit)
            .copied()
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WarmSummary {
    pub pages: usize,
    pub scheduled: usize,
}

/// Walks a [`LocationSource`] page by page and schedules one refresh per
/// entry. Identical coordinates are not deduplicated.
pub struct CacheWarmer {
    scheduler: Arc<dyn RefreshScheduler>,
    chunk_size: usize,
    queue: String,
}

impl CacheWarmer {
    pub fn new(scheduler: Arc<dyn RefreshScheduler>, chunk_size: usize) -> Self {
        Self {
            scheduler,
            chunk_size,
            queue: DEFAULT_QUEUE.to_string(),
        }
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Schedule refreshes for every location; does not wait for them.
    ///
    /// # Errors
    /// Fails on a zero chunk size or when the source fails; tasks scheduled
    /// before the failure stay scheduled.
    pub fn warm<S: LocationSource + ?Sized>(&self, source: &S) -> Result<WarmSummary> {
        if self.chunk_size == 0 {
            bail!("chunk size must be greater than 0");
        }

        let mut summary = WarmSummary::default();
        let mut after = None;

        loop {
            let page = source.page(after, self.chunk_size)?;
            let Some(last) = page.last() else {
                break;
            };
            after = Some(last.id);
            summary.pages += 1;

            for location in &page {
                self.scheduler
                    .schedule(RefreshTask::new(location.lat, location.lon), &self.queue);
            }
            summary.scheduled += page.len();

            tracing::debug!(
                "Warm-up page {}: scheduled {} refreshes",
                summary.pages,
                page.len()
            );

            if page.len() < self.chunk_size {
                break;
            }
        }

        tracing::info!(
            "Weather cache warm-up dispatched {} refreshes in {} pages",
            summary.scheduled,
            summary.pages
        );
        Ok(summary)
    }
}
