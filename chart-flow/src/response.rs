use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{
    error::{ChartError, Result},
    field::{ChartField, ChartFieldValue},
    key::SearchParams,
};

/// Chart data keyed by field.
///
/// Values are reference counted so a copy with one field replaced shares every other field
/// with the original.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct ChartDataResponse {
    fields: BTreeMap<ChartField, Arc<ChartFieldValue>>,
}

impl ChartDataResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = ChartFieldValue>) -> Self {
        Self {
            fields: values
                .into_iter()
                .map(|value| (value.field(), Arc::new(value)))
                .collect(),
        }
    }

    pub fn get(&self, field: ChartField) -> Option<&Arc<ChartFieldValue>> {
        self.fields.get(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = ChartField> + '_ {
        self.fields.keys().copied()
    }

    pub fn values(&self) -> impl Iterator<Item = &Arc<ChartFieldValue>> {
        self.fields.values()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn insert(&mut self, value: ChartFieldValue) {
        self.fields.insert(value.field(), Arc::new(value));
    }

    pub fn remove(&mut self, field: ChartField) -> Option<Arc<ChartFieldValue>> {
        self.fields.remove(&field)
    }

    /// Copy of this response with `value` replacing its field
    pub fn with_field(&self, value: ChartFieldValue) -> Self {
        let mut next = self.clone();
        next.insert(value);
        next
    }
}

impl TryFrom<Map<String, Value>> for ChartDataResponse {
    type Error = ChartError;

    fn try_from(map: Map<String, Value>) -> Result<Self> {
        let mut response = ChartDataResponse::new();
        for (name, value) in map {
            let field: ChartField = name.parse()?;
            response.insert(ChartFieldValue::from_json(field, value)?);
        }
        Ok(response)
    }
}

impl Serialize for ChartDataResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (field, value) in &self.fields {
            map.serialize_entry(field, value.as_ref())?;
        }
        map.end()
    }
}

/// Request for chart data of an encounter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataRequest {
    pub encounter_id: String,
    /// Fields to return with their search parameters; empty means every field
    #[serde(default)]
    pub requested_fields: BTreeMap<ChartField, SearchParams>,
}

impl ChartDataRequest {
    pub fn all(encounter_id: impl Into<String>) -> Self {
        Self {
            encounter_id: encounter_id.into(),
            requested_fields: BTreeMap::new(),
        }
    }

    pub fn single(encounter_id: impl Into<String>, field: ChartField, params: SearchParams) -> Self {
        Self {
            encounter_id: encounter_id.into(),
            requested_fields: BTreeMap::from([(field, params)]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub resource_id: String,
}

/// Deletion of chart resources grouped by field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataDeletion {
    pub encounter_id: String,
    #[serde(flatten)]
    pub targets: BTreeMap<ChartField, Vec<ResourceRef>>,
}

impl ChartDataDeletion {
    pub fn single(
        encounter_id: impl Into<String>,
        field: ChartField,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            encounter_id: encounter_id.into(),
            targets: BTreeMap::from([(
                field,
                vec![ResourceRef {
                    resource_id: resource_id.into(),
                }],
            )]),
        }
    }

    pub fn resource_count(&self) -> usize {
        self.targets.values().map(Vec::len).sum()
    }
}

/// Chart data to persist for an encounter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveChartDataRequest {
    pub encounter_id: String,
    #[serde(flatten)]
    pub data: ChartDataResponse,
}
