use serde::{Deserialize, Serialize};
use std::fmt;

use crate::field::ChartField;

/// FHIR search parameters attached to a chart-data field request
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(rename = "_sort", default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(rename = "_count", default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(rename = "_offset", default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(rename = "_tag", default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl SearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Identity of one cached chart-data slice
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    encounter_id: String,
    field: ChartField,
    params: SearchParams,
}

impl CacheKey {
    pub fn resolve(encounter_id: impl Into<String>, field: ChartField, params: &SearchParams) -> Self {
        Self {
            encounter_id: encounter_id.into(),
            field,
            params: params.clone(),
        }
    }

    pub fn encounter_id(&self) -> &str {
        &self.encounter_id
    }

    pub fn field(&self) -> ChartField {
        self.field
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chart-data/{}/{}", self.encounter_id, self.field)?;
        if self.params != SearchParams::default() {
            let params = serde_json::to_string(&self.params).map_err(|_| fmt::Error)?;
            write!(f, "?{}", params)?;
        }
        Ok(())
    }
}
