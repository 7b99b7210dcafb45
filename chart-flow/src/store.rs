use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::{ChartError, Result},
    field::ChartFieldValue,
    response::{ChartDataDeletion, ChartDataRequest, ChartDataResponse},
};

/// Authoritative source of chart data
#[async_trait]
pub trait ChartDataStore: Send + Sync {
    async fn fetch(&self, request: &ChartDataRequest) -> Result<ChartDataResponse>;

    async fn delete(&self, deletion: &ChartDataDeletion) -> Result<()>;

    /// Appends list items and replaces scalar fields. Returns the saved values with their
    /// assigned resource ids.
    async fn save(&self, encounter_id: &str, data: ChartDataResponse) -> Result<ChartDataResponse>;
}

/// In-memory implementation of ChartDataStore
pub struct InMemoryChartDataStore {
    encounters: Arc<DashMap<String, ChartDataResponse>>,
}

impl InMemoryChartDataStore {
    pub fn new() -> Self {
        Self {
            encounters: Arc::new(DashMap::new()),
        }
    }

    /// Replaces all chart data of an encounter
    pub fn put(&self, encounter_id: impl Into<String>, data: ChartDataResponse) {
        self.encounters.insert(encounter_id.into(), data);
    }

    pub fn snapshot(&self, encounter_id: &str) -> Option<ChartDataResponse> {
        self.encounters.get(encounter_id).map(|entry| entry.clone())
    }
}

impl Default for InMemoryChartDataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChartDataStore for InMemoryChartDataStore {
    async fn fetch(&self, request: &ChartDataRequest) -> Result<ChartDataResponse> {
        let Some(data) = self.snapshot(&request.encounter_id) else {
            debug!("No chart data for encounter {}", request.encounter_id);
            return Ok(ChartDataResponse::new());
        };

        if request.requested_fields.is_empty() {
            return Ok(data);
        }

        let mut response = ChartDataResponse::new();
        for (field, params) in &request.requested_fields {
            if let Some(value) = data.get(*field) {
                response.insert(value.paged(params.offset, params.count));
            }
        }
        Ok(response)
    }

    async fn delete(&self, deletion: &ChartDataDeletion) -> Result<()> {
        let mut entry = self
            .encounters
            .get_mut(&deletion.encounter_id)
            .ok_or_else(|| ChartError::EncounterNotFound(deletion.encounter_id.clone()))?;
        let data = entry.value_mut();

        // Validate everything first so a partial miss leaves the encounter unchanged
        for (field, refs) in &deletion.targets {
            let known: HashSet<&str> = data
                .get(*field)
                .map(|value| value.resource_ids().into_iter().collect())
                .unwrap_or_default();
            if let Some(missing) = refs.iter().find(|r| !known.contains(r.resource_id.as_str())) {
                return Err(ChartError::ResourceNotFound(format!(
                    "{} {}",
                    field, missing.resource_id
                )));
            }
        }

        let mut next = data.clone();
        for (field, refs) in &deletion.targets {
            let Some(current) = next.get(*field).cloned() else {
                continue;
            };
            match refs
                .iter()
                .try_fold((*current).clone(), |value, r| value.without_resource(&r.resource_id))
            {
                Some(filtered) => next.insert(filtered),
                None => {
                    next.remove(*field);
                }
            }
        }
        *data = next;

        info!(
            "Deleted {} resource(s) from encounter {}",
            deletion.resource_count(),
            deletion.encounter_id
        );
        Ok(())
    }

    async fn save(&self, encounter_id: &str, data: ChartDataResponse) -> Result<ChartDataResponse> {
        let mut saved = ChartDataResponse::new();
        for value in data.values() {
            let mut value: ChartFieldValue = (**value).clone();
            value.assign_missing_ids(|| Uuid::new_v4().to_string());
            saved.insert(value);
        }

        let mut entry = self.encounters.entry(encounter_id.to_string()).or_default();
        let mut next = entry.value().clone();
        for value in saved.values() {
            let merged = match next.get(value.field()) {
                Some(current) => current.merged_with((**value).clone())?,
                None => (**value).clone(),
            };
            next.insert(merged);
        }
        *entry = next;

        info!(
            "Saved {} field(s) for encounter {}",
            saved.fields().count(),
            encounter_id
        );
        Ok(saved)
    }
}
