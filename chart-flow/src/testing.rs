//! Test doubles shared by the unit tests of this crate.

use async_trait::async_trait;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::{Notify, Semaphore};

use crate::{
    cache::{CachedSlice, ChartCache, InMemoryChartCache, SliceUpdater},
    error::{ChartError, Result},
    key::CacheKey,
    notify::{Notification, Notifier},
    response::{ChartDataDeletion, ChartDataRequest, ChartDataResponse},
    store::{ChartDataStore, InMemoryChartDataStore},
};

/// In-memory store that counts calls and can be told to fail or to hold fetches
pub struct CountingStore {
    inner: InMemoryChartDataStore,
    fetches: AtomicUsize,
    deletes: AtomicUsize,
    fail_delete: Option<String>,
    fail_fetch: Option<String>,
    fetch_gate: Option<Arc<Semaphore>>,
    fetch_started: Notify,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryChartDataStore::new(),
            fetches: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            fail_delete: None,
            fail_fetch: None,
            fetch_gate: None,
            fetch_started: Notify::new(),
        }
    }

    pub fn with_data(encounter_id: &str, data: ChartDataResponse) -> Self {
        let store = Self::new();
        store.inner.put(encounter_id, data);
        store
    }

    pub fn failing_delete(mut self, message: &str) -> Self {
        self.fail_delete = Some(message.to_string());
        self
    }

    pub fn failing_fetch(mut self, message: &str) -> Self {
        self.fail_fetch = Some(message.to_string());
        self
    }

    /// Fetches block until a permit is added to `gate`
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.fetch_gate = Some(gate);
        self
    }

    /// Resolves once a fetch has reached the store, even if it happened before the call
    pub async fn fetch_started(&self) {
        self.fetch_started.notified().await
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self, encounter_id: &str) -> Option<ChartDataResponse> {
        self.inner.snapshot(encounter_id)
    }
}

#[async_trait]
impl ChartDataStore for CountingStore {
    async fn fetch(&self, request: &ChartDataRequest) -> Result<ChartDataResponse> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.fetch_started.notify_one();
        if let Some(gate) = &self.fetch_gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| ChartError::RequestFailed(e.to_string()))?;
            permit.forget();
        }
        if let Some(message) = &self.fail_fetch {
            return Err(ChartError::RequestFailed(message.clone()));
        }
        self.inner.fetch(request).await
    }

    async fn delete(&self, deletion: &ChartDataDeletion) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_delete {
            return Err(ChartError::RequestFailed(message.clone()));
        }
        self.inner.delete(deletion).await
    }

    async fn save(&self, encounter_id: &str, data: ChartDataResponse) -> Result<ChartDataResponse> {
        self.inner.save(encounter_id, data).await
    }
}

/// Notifier that keeps every notification it receives
#[derive(Default)]
pub struct RecordingNotifier {
    received: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn received(&self) -> Vec<Notification> {
        self.received.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.received.lock().unwrap().push(notification);
    }
}

/// Cache whose every operation fails
pub struct BrokenCache;

#[async_trait]
impl ChartCache for BrokenCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<CachedSlice>> {
        Err(ChartError::CacheError("cache unavailable".to_string()))
    }

    async fn set(&self, _key: &CacheKey, _updater: SliceUpdater) -> Result<Option<CachedSlice>> {
        Err(ChartError::CacheError("cache unavailable".to_string()))
    }

    async fn compare_and_set(
        &self,
        _key: &CacheKey,
        _expected: Option<u64>,
        _data: ChartDataResponse,
    ) -> Result<bool> {
        Err(ChartError::CacheError("cache unavailable".to_string()))
    }

    async fn invalidate(&self, _key: &CacheKey) -> Result<()> {
        Err(ChartError::CacheError("cache unavailable".to_string()))
    }

    async fn remove(&self, _key: &CacheKey) -> Result<()> {
        Err(ChartError::CacheError("cache unavailable".to_string()))
    }
}

/// In-memory cache that refuses to mark slices stale
#[derive(Default)]
pub struct StaleProofCache {
    inner: InMemoryChartCache,
    invalidations: AtomicUsize,
}

impl StaleProofCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate_attempts(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChartCache for StaleProofCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedSlice>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &CacheKey, updater: SliceUpdater) -> Result<Option<CachedSlice>> {
        self.inner.set(key, updater).await
    }

    async fn compare_and_set(
        &self,
        key: &CacheKey,
        expected: Option<u64>,
        data: ChartDataResponse,
    ) -> Result<bool> {
        self.inner.compare_and_set(key, expected, data).await
    }

    async fn invalidate(&self, _key: &CacheKey) -> Result<()> {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        Err(ChartError::CacheError("invalidate unavailable".to_string()))
    }

    async fn remove(&self, key: &CacheKey) -> Result<()> {
        self.inner.remove(key).await
    }
}
