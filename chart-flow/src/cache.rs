use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tracing::debug;

use crate::{error::Result, key::CacheKey, response::ChartDataResponse};

/// One cached chart-data slice
#[derive(Debug, Clone)]
pub struct CachedSlice {
    pub data: Arc<ChartDataResponse>,
    /// Unique per cache instance, bumped on every write
    pub version: u64,
    /// Set once the slice is known to be out of date; the next read refetches it
    pub stale: bool,
    pub updated_at: DateTime<Utc>,
}

/// Pure function from the current slice (if any) to its replacement.
///
/// Returning `None` leaves the cache untouched.
pub type SliceUpdater =
    Box<dyn FnOnce(Option<&CachedSlice>) -> Option<ChartDataResponse> + Send + 'static>;

/// Client-side cache of chart-data slices
#[async_trait]
pub trait ChartCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedSlice>>;

    /// Applies `updater` atomically with respect to every other operation on `key`.
    ///
    /// Returns the written slice, or `None` when the updater declined.
    async fn set(&self, key: &CacheKey, updater: SliceUpdater) -> Result<Option<CachedSlice>>;

    /// Writes `data` only if the slice version still equals `expected`
    /// (`None` meaning no slice at all). Returns whether the write happened.
    async fn compare_and_set(
        &self,
        key: &CacheKey,
        expected: Option<u64>,
        data: ChartDataResponse,
    ) -> Result<bool>;

    /// Flags the slice as stale without discarding it
    async fn invalidate(&self, key: &CacheKey) -> Result<()>;

    /// Drops the slice entirely; the next read starts from an empty cache
    async fn remove(&self, key: &CacheKey) -> Result<()>;
}

/// In-memory implementation of ChartCache
pub struct InMemoryChartCache {
    slices: Arc<DashMap<CacheKey, CachedSlice>>,
    next_version: AtomicU64,
}

impl InMemoryChartCache {
    pub fn new() -> Self {
        Self {
            slices: Arc::new(DashMap::new()),
            next_version: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    fn slice(&self, data: ChartDataResponse) -> CachedSlice {
        CachedSlice {
            data: Arc::new(data),
            version: self.next_version.fetch_add(1, Ordering::Relaxed),
            stale: false,
            updated_at: Utc::now(),
        }
    }
}

impl Default for InMemoryChartCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChartCache for InMemoryChartCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedSlice>> {
        Ok(self.slices.get(key).map(|entry| entry.clone()))
    }

    async fn set(&self, key: &CacheKey, updater: SliceUpdater) -> Result<Option<CachedSlice>> {
        match self.slices.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let Some(next) = updater(Some(entry.get())) else {
                    return Ok(None);
                };
                let slice = self.slice(next);
                entry.insert(slice.clone());
                debug!("Updated cache slice {} to version {}", key, slice.version);
                Ok(Some(slice))
            }
            Entry::Vacant(entry) => {
                let Some(next) = updater(None) else {
                    return Ok(None);
                };
                let slice = self.slice(next);
                entry.insert(slice.clone());
                debug!("Created cache slice {} at version {}", key, slice.version);
                Ok(Some(slice))
            }
        }
    }

    async fn compare_and_set(
        &self,
        key: &CacheKey,
        expected: Option<u64>,
        data: ChartDataResponse,
    ) -> Result<bool> {
        match self.slices.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if expected != Some(entry.get().version) {
                    return Ok(false);
                }
                entry.insert(self.slice(data));
                Ok(true)
            }
            Entry::Vacant(entry) => {
                if expected.is_some() {
                    return Ok(false);
                }
                entry.insert(self.slice(data));
                Ok(true)
            }
        }
    }

    async fn invalidate(&self, key: &CacheKey) -> Result<()> {
        if let Some(mut slice) = self.slices.get_mut(key) {
            slice.stale = true;
            slice.version = self.next_version.fetch_add(1, Ordering::Relaxed);
            debug!("Marked cache slice {} stale", key);
        }
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<()> {
        if self.slices.remove(key).is_some() {
            debug!("Discarded cache slice {}", key);
        }
        Ok(())
    }
}
