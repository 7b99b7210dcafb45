//! Deletion of chart entities with cache reconciliation.
//!
//! [`MutationDispatcher::delete`] issues exactly one delete request to the chart data store.
//! Once the store confirms, the cached slice is filtered in place, or refetched when it cannot
//! be updated safely. Every failure is reported to the user once through the [`Notifier`] and
//! handed back to the caller. The call returns only after the cache is reconciled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    cache::ChartCache,
    error::Result,
    field::ChartField,
    key::SearchParams,
    notify::{Notification, Notifier, NoteLocales, Operation},
    query::ChartDataQuery,
    reconcile::{CacheReconciler, Reconciliation},
    response::ChartDataDeletion,
    store::ChartDataStore,
};

/// A note the user can edit or delete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditableNote {
    pub resource_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl EditableNote {
    pub fn new(resource_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            text: text.into(),
            author_name: None,
            last_updated: None,
        }
    }
}

/// Which chart field a notes list reads and mutates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteApiConfig {
    pub field_name: ChartField,
    #[serde(default)]
    pub search_params: SearchParams,
}

impl NoteApiConfig {
    pub fn new(field_name: ChartField) -> Self {
        Self {
            field_name,
            search_params: SearchParams::default(),
        }
    }

    pub fn with_search_params(mut self, search_params: SearchParams) -> Self {
        self.search_params = search_params;
        self
    }
}

/// Issues chart-data mutations for one encounter field and keeps its cache slice consistent
#[derive(Clone)]
pub struct MutationDispatcher {
    encounter_id: String,
    field: ChartField,
    store: Arc<dyn ChartDataStore>,
    query: ChartDataQuery,
    reconciler: CacheReconciler,
    notifier: Arc<dyn Notifier>,
    locales: NoteLocales,
}

impl MutationDispatcher {
    pub fn new(
        encounter_id: impl Into<String>,
        api_config: NoteApiConfig,
        store: Arc<dyn ChartDataStore>,
        cache: Arc<dyn ChartCache>,
        notifier: Arc<dyn Notifier>,
        locales: NoteLocales,
    ) -> Self {
        let encounter_id = encounter_id.into();
        let query = ChartDataQuery::new(
            encounter_id.clone(),
            api_config.field_name,
            api_config.search_params,
            store.clone(),
            cache,
        );
        Self {
            encounter_id,
            field: api_config.field_name,
            store,
            reconciler: CacheReconciler::new(query.clone()),
            query,
            notifier,
            locales,
        }
    }

    /// The read side sharing this dispatcher's cache slice
    pub fn query(&self) -> &ChartDataQuery {
        &self.query
    }

    /// Deletes `note` from the store, then reconciles the cached slice
    pub async fn delete(&self, note: &EditableNote) -> Result<()> {
        let deletion =
            ChartDataDeletion::single(self.encounter_id.clone(), self.field, note.resource_id.clone());

        if let Err(e) = self.store.delete(&deletion).await {
            error!(
                "Failed to delete {} {} of encounter {}: {}",
                self.field, note.resource_id, self.encounter_id, e
            );
            self.report_failure(Operation::Deletion);
            return Err(e);
        }

        match self.reconciler.reconcile_deletion(&note.resource_id).await {
            Ok(Reconciliation::Updated { version }) => {
                debug!(
                    "Deleted {} {}, cache at version {}",
                    self.field, note.resource_id, version
                );
                Ok(())
            }
            Ok(Reconciliation::Refetched) => {
                debug!("Deleted {} {}, cache refetched", self.field, note.resource_id);
                Ok(())
            }
            Err(e) => {
                error!(
                    "Deleted {} {} but cache reconciliation failed: {}",
                    self.field, note.resource_id, e
                );
                self.report_failure(Operation::Deletion);
                Err(e)
            }
        }
    }

    fn report_failure(&self, operation: Operation) {
        self.notifier
            .notify(Notification::error(self.locales.error_message(operation)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::InMemoryChartCache,
        error::ChartError,
        field::{ChartFieldValue, DiagnosisDto},
        notify::NotificationVariant,
        response::ChartDataResponse,
        testing::{BrokenCache, CountingStore, RecordingNotifier},
    };
    use tokio::sync::Semaphore;

    fn diagnosis(id: &str) -> DiagnosisDto {
        DiagnosisDto {
            resource_id: Some(id.to_string()),
            code: "J02.9".to_string(),
            display: "Acute pharyngitis".to_string(),
            is_primary: false,
        }
    }

    fn diagnoses(ids: &[&str]) -> ChartDataResponse {
        ChartDataResponse::from_values([ChartFieldValue::Diagnosis(
            ids.iter().map(|id| diagnosis(id)).collect(),
        )])
    }

    struct Fixture {
        store: Arc<CountingStore>,
        cache: Arc<InMemoryChartCache>,
        notifier: Arc<RecordingNotifier>,
        dispatcher: MutationDispatcher,
    }

    fn fixture(store: CountingStore) -> Fixture {
        let store = Arc::new(store);
        let cache = Arc::new(InMemoryChartCache::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = MutationDispatcher::new(
            "enc-1",
            NoteApiConfig::new(ChartField::Diagnosis),
            store.clone(),
            cache.clone(),
            notifier.clone(),
            NoteLocales::new("diagnosis"),
        );
        Fixture {
            store,
            cache,
            notifier,
            dispatcher,
        }
    }

    async fn seed_cache(fixture: &Fixture, data: ChartDataResponse) {
        let key = fixture.dispatcher.query().key().clone();
        assert!(fixture.cache.compare_and_set(&key, None, data).await.unwrap());
    }

    async fn cached(fixture: &Fixture) -> Option<ChartDataResponse> {
        let key = fixture.dispatcher.query().key().clone();
        fixture
            .cache
            .get(&key)
            .await
            .unwrap()
            .map(|slice| (*slice.data).clone())
    }

    #[tokio::test]
    async fn deletes_entity_from_cached_field() {
        let f = fixture(CountingStore::with_data("enc-1", diagnoses(&["A", "B"])));
        seed_cache(&f, diagnoses(&["A", "B"])).await;

        f.dispatcher
            .delete(&EditableNote::new("B", "Acute pharyngitis"))
            .await
            .unwrap();

        assert_eq!(cached(&f).await, Some(diagnoses(&["A"])));
        assert_eq!(f.store.delete_count(), 1);
        assert_eq!(f.store.fetch_count(), 0);
        assert!(f.notifier.received().is_empty());
    }

    #[tokio::test]
    async fn leaves_other_fields_shared() {
        let f = fixture(CountingStore::with_data("enc-1", diagnoses(&["A", "B"])));
        let mut seeded = diagnoses(&["A", "B"]);
        seeded.insert(ChartFieldValue::Notes(Vec::new()));
        seed_cache(&f, seeded.clone()).await;

        f.dispatcher.delete(&EditableNote::new("A", "")).await.unwrap();

        let after = cached(&f).await.unwrap();
        assert!(Arc::ptr_eq(
            seeded.get(ChartField::Notes).unwrap(),
            after.get(ChartField::Notes).unwrap()
        ));
        assert_eq!(
            after.get(ChartField::Diagnosis).map(|v| (**v).clone()),
            Some(ChartFieldValue::Diagnosis(vec![diagnosis("B")]))
        );
    }

    #[tokio::test]
    async fn refetches_when_field_is_not_cached() {
        let gate = Arc::new(Semaphore::new(0));
        let f = fixture(
            CountingStore::with_data("enc-1", diagnoses(&["A", "B"])).gated(gate.clone()),
        );
        seed_cache(&f, ChartDataResponse::new()).await;

        let dispatcher = f.dispatcher.clone();
        let pending = tokio::spawn(async move {
            dispatcher.delete(&EditableNote::new("B", "")).await
        });

        f.store.fetch_started().await;
        assert!(!pending.is_finished());
        assert_eq!(f.store.fetch_count(), 1);

        gate.add_permits(1);
        pending.await.unwrap().unwrap();

        assert_eq!(f.store.fetch_count(), 1);
        assert_eq!(cached(&f).await, Some(diagnoses(&["A"])));
        assert!(f.notifier.received().is_empty());
    }

    #[tokio::test]
    async fn refetches_when_nothing_is_cached() {
        let f = fixture(CountingStore::with_data("enc-1", diagnoses(&["A", "B"])));

        f.dispatcher.delete(&EditableNote::new("B", "")).await.unwrap();

        assert_eq!(f.store.fetch_count(), 1);
        assert_eq!(cached(&f).await, Some(diagnoses(&["A"])));
    }

    #[tokio::test]
    async fn failed_delete_reports_once_and_keeps_cache() {
        let f = fixture(
            CountingStore::with_data("enc-1", diagnoses(&["A", "B"])).failing_delete("network error"),
        );
        seed_cache(&f, diagnoses(&["A", "B"])).await;

        let result = f.dispatcher.delete(&EditableNote::new("B", "")).await;

        match result {
            Err(ChartError::RequestFailed(message)) => assert_eq!(message, "network error"),
            other => panic!("unexpected result {:?}", other),
        }
        let received = f.notifier.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].variant, NotificationVariant::Error);
        assert_eq!(
            received[0].message,
            "An error occurred during diagnosis deletion. Please try again."
        );
        assert_eq!(cached(&f).await, Some(diagnoses(&["A", "B"])));
        assert_eq!(f.store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn failed_refetch_reports_once_and_marks_stale() {
        let f = fixture(
            CountingStore::with_data("enc-1", diagnoses(&["A", "B"])).failing_fetch("bad gateway"),
        );
        seed_cache(&f, ChartDataResponse::new()).await;

        let result = f.dispatcher.delete(&EditableNote::new("B", "")).await;

        assert!(matches!(result, Err(ChartError::RequestFailed(_))));
        assert_eq!(f.notifier.received().len(), 1);
        let key = f.dispatcher.query().key().clone();
        assert!(f.cache.get(&key).await.unwrap().unwrap().stale);
        assert_eq!(
            f.store.snapshot("enc-1").unwrap(),
            diagnoses(&["A"]),
            "the store keeps the confirmed deletion"
        );
    }

    #[tokio::test]
    async fn cache_failure_is_reported() {
        let store = Arc::new(CountingStore::with_data("enc-1", diagnoses(&["A"])));
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = MutationDispatcher::new(
            "enc-1",
            NoteApiConfig::new(ChartField::Diagnosis),
            store.clone(),
            Arc::new(BrokenCache),
            notifier.clone(),
            NoteLocales::new("diagnosis"),
        );

        let result = dispatcher.delete(&EditableNote::new("A", "")).await;

        assert!(matches!(result, Err(ChartError::CacheError(_))));
        assert_eq!(notifier.received().len(), 1);
        assert_eq!(store.delete_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_deletions_on_one_slice_both_apply() {
        let f = fixture(CountingStore::with_data("enc-1", diagnoses(&["A", "B", "C"])));
        seed_cache(&f, diagnoses(&["A", "B", "C"])).await;

        let first = f.dispatcher.clone();
        let second = f.dispatcher.clone();
        let (a, c) = tokio::join!(
            tokio::spawn(async move { first.delete(&EditableNote::new("A", "")).await }),
            tokio::spawn(async move { second.delete(&EditableNote::new("C", "")).await }),
        );
        a.unwrap().unwrap();
        c.unwrap().unwrap();

        assert_eq!(cached(&f).await, Some(diagnoses(&["B"])));
        assert_eq!(f.store.fetch_count(), 0);
    }
}
