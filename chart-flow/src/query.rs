use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    cache::ChartCache,
    error::Result,
    field::ChartField,
    key::{CacheKey, SearchParams},
    response::{ChartDataRequest, ChartDataResponse},
    store::ChartDataStore,
};

/// Read-through access to one chart-data field of an encounter
#[derive(Clone)]
pub struct ChartDataQuery {
    encounter_id: String,
    field: ChartField,
    search_params: SearchParams,
    key: CacheKey,
    store: Arc<dyn ChartDataStore>,
    cache: Arc<dyn ChartCache>,
}

impl ChartDataQuery {
    pub fn new(
        encounter_id: impl Into<String>,
        field: ChartField,
        search_params: SearchParams,
        store: Arc<dyn ChartDataStore>,
        cache: Arc<dyn ChartCache>,
    ) -> Self {
        let encounter_id = encounter_id.into();
        let key = CacheKey::resolve(encounter_id.clone(), field, &search_params);
        Self {
            encounter_id,
            field,
            search_params,
            key,
            store,
            cache,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn field(&self) -> ChartField {
        self.field
    }

    pub fn encounter_id(&self) -> &str {
        &self.encounter_id
    }

    pub fn cache(&self) -> &Arc<dyn ChartCache> {
        &self.cache
    }

    fn request(&self) -> ChartDataRequest {
        ChartDataRequest::single(
            self.encounter_id.clone(),
            self.field,
            self.search_params.clone(),
        )
    }

    /// Cached data when fresh, otherwise a refetch
    pub async fn get(&self) -> Result<Arc<ChartDataResponse>> {
        match self.cache.get(&self.key).await? {
            Some(slice) if !slice.stale => {
                debug!("Cache hit for {}", self.key);
                Ok(slice.data)
            }
            Some(_) => {
                debug!("Cache slice {} is stale", self.key);
                self.refetch().await
            }
            None => {
                debug!("Cache miss for {}", self.key);
                self.refetch().await
            }
        }
    }

    /// Re-requests the whole slice from the store and replaces the cached copy.
    ///
    /// If the slice was written while the request was in flight, the fetched data may predate
    /// that write, so the slice is marked stale instead of being overwritten.
    pub async fn refetch(&self) -> Result<Arc<ChartDataResponse>> {
        let observed = self.cache.get(&self.key).await?.map(|slice| slice.version);

        info!("Fetching {} from chart data store", self.key);
        let fresh = self.store.fetch(&self.request()).await?;

        if !self
            .cache
            .compare_and_set(&self.key, observed, fresh.clone())
            .await?
        {
            warn!(
                "Cache slice {} changed during refetch, marking it stale",
                self.key
            );
            self.cache.invalidate(&self.key).await?;
        }

        Ok(Arc::new(fresh))
    }

    /// Drops the cached slice once its owner goes away
    pub async fn discard(&self) -> Result<()> {
        debug!("Discarding {}", self.key);
        self.cache.remove(&self.key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::InMemoryChartCache,
        field::{ChartFieldValue, DiagnosisDto},
        testing::CountingStore,
    };

    fn diagnosis(id: &str) -> ChartFieldValue {
        ChartFieldValue::Diagnosis(vec![DiagnosisDto {
            resource_id: Some(id.to_string()),
            code: "R50.9".to_string(),
            display: "Fever".to_string(),
            is_primary: true,
        }])
    }

    fn query(store: Arc<CountingStore>, cache: Arc<InMemoryChartCache>) -> ChartDataQuery {
        ChartDataQuery::new("enc-1", ChartField::Diagnosis, SearchParams::new(), store, cache)
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let store = Arc::new(CountingStore::with_data(
            "enc-1",
            ChartDataResponse::from_values([diagnosis("A")]),
        ));
        let cache = Arc::new(InMemoryChartCache::new());
        let query = query(store.clone(), cache);

        let first = query.get().await.unwrap();
        let second = query.get().await.unwrap();

        assert_eq!(store.fetch_count(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn stale_slice_is_refetched() {
        let store = Arc::new(CountingStore::with_data(
            "enc-1",
            ChartDataResponse::from_values([diagnosis("A")]),
        ));
        let cache = Arc::new(InMemoryChartCache::new());
        let query = query(store.clone(), cache.clone());

        query.get().await.unwrap();
        cache.invalidate(query.key()).await.unwrap();
        query.get().await.unwrap();

        assert_eq!(store.fetch_count(), 2);
        assert!(!cache.get(query.key()).await.unwrap().unwrap().stale);
    }

    #[tokio::test]
    async fn discarded_slice_is_fetched_again() {
        let store = Arc::new(CountingStore::with_data(
            "enc-1",
            ChartDataResponse::from_values([diagnosis("A")]),
        ));
        let cache = Arc::new(InMemoryChartCache::new());
        let query = query(store.clone(), cache.clone());

        query.get().await.unwrap();
        query.discard().await.unwrap();

        assert!(cache.is_empty());
        query.get().await.unwrap();
        assert_eq!(store.fetch_count(), 2);
    }
}
