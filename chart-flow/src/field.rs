use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{ChartError, Result};

/// Known chart-data fields of an encounter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartField {
    Diagnosis,
    Conditions,
    Allergies,
    Medications,
    CptCodes,
    Notes,
    MedicalDecision,
    ChiefComplaint,
    EmCode,
}

impl ChartField {
    pub const ALL: [ChartField; 9] = [
        ChartField::Diagnosis,
        ChartField::Conditions,
        ChartField::Allergies,
        ChartField::Medications,
        ChartField::CptCodes,
        ChartField::Notes,
        ChartField::MedicalDecision,
        ChartField::ChiefComplaint,
        ChartField::EmCode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartField::Diagnosis => "diagnosis",
            ChartField::Conditions => "conditions",
            ChartField::Allergies => "allergies",
            ChartField::Medications => "medications",
            ChartField::CptCodes => "cptCodes",
            ChartField::Notes => "notes",
            ChartField::MedicalDecision => "medicalDecision",
            ChartField::ChiefComplaint => "chiefComplaint",
            ChartField::EmCode => "emCode",
        }
    }

    /// Whether the field holds a sequence of entities rather than a single value
    pub fn is_list(&self) -> bool {
        !matches!(
            self,
            ChartField::MedicalDecision | ChartField::ChiefComplaint | ChartField::EmCode
        )
    }
}

impl fmt::Display for ChartField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartField {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self> {
        ChartField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| ChartError::InvalidChartData(format!("unknown chart field '{}'", s)))
    }
}

/// Anything stored in chart data that can be addressed by its FHIR resource id
pub trait ChartEntity {
    fn resource_id(&self) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    pub code: String,
    pub display: String,
    #[serde(default)]
    pub is_primary: bool,
}

/// Coded entry shared by conditions, allergies, medications and billing codes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeableDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub display: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NoteType {
    #[default]
    ProgressNote,
    Intake,
    Screening,
    Vitals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub note_type: NoteType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeTextNoteDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    pub text: String,
}

macro_rules! impl_chart_entity {
    ($($ty:ty),*) => {
        $(
            impl ChartEntity for $ty {
                fn resource_id(&self) -> Option<&str> {
                    self.resource_id.as_deref()
                }
            }
        )*
    };
}

impl_chart_entity!(DiagnosisDto, CodeableDto, NoteDto, FreeTextNoteDto);

/// Typed payload of a single chart field
#[derive(Debug, Clone, PartialEq)]
pub enum ChartFieldValue {
    Diagnosis(Vec<DiagnosisDto>),
    Conditions(Vec<CodeableDto>),
    Allergies(Vec<CodeableDto>),
    Medications(Vec<CodeableDto>),
    CptCodes(Vec<CodeableDto>),
    Notes(Vec<NoteDto>),
    MedicalDecision(FreeTextNoteDto),
    ChiefComplaint(FreeTextNoteDto),
    EmCode(CodeableDto),
}

fn retain_others<T: ChartEntity + Clone>(items: &[T], resource_id: &str) -> Vec<T> {
    items
        .iter()
        .filter(|item| item.resource_id() != Some(resource_id))
        .cloned()
        .collect()
}

fn page<T: Clone>(items: &[T], offset: Option<usize>, count: Option<usize>) -> Vec<T> {
    items
        .iter()
        .skip(offset.unwrap_or(0))
        .take(count.unwrap_or(usize::MAX))
        .cloned()
        .collect()
}

impl ChartFieldValue {
    pub fn field(&self) -> ChartField {
        match self {
            ChartFieldValue::Diagnosis(_) => ChartField::Diagnosis,
            ChartFieldValue::Conditions(_) => ChartField::Conditions,
            ChartFieldValue::Allergies(_) => ChartField::Allergies,
            ChartFieldValue::Medications(_) => ChartField::Medications,
            ChartFieldValue::CptCodes(_) => ChartField::CptCodes,
            ChartFieldValue::Notes(_) => ChartField::Notes,
            ChartFieldValue::MedicalDecision(_) => ChartField::MedicalDecision,
            ChartFieldValue::ChiefComplaint(_) => ChartField::ChiefComplaint,
            ChartFieldValue::EmCode(_) => ChartField::EmCode,
        }
    }

    /// An empty value for list fields, `None` for scalar ones
    pub fn empty(field: ChartField) -> Option<Self> {
        match field {
            ChartField::Diagnosis => Some(ChartFieldValue::Diagnosis(Vec::new())),
            ChartField::Conditions => Some(ChartFieldValue::Conditions(Vec::new())),
            ChartField::Allergies => Some(ChartFieldValue::Allergies(Vec::new())),
            ChartField::Medications => Some(ChartFieldValue::Medications(Vec::new())),
            ChartField::CptCodes => Some(ChartFieldValue::CptCodes(Vec::new())),
            ChartField::Notes => Some(ChartFieldValue::Notes(Vec::new())),
            ChartField::MedicalDecision | ChartField::ChiefComplaint | ChartField::EmCode => None,
        }
    }

    /// Resource ids of every entity held by this value
    pub fn resource_ids(&self) -> Vec<&str> {
        fn ids<T: ChartEntity>(items: &[T]) -> Vec<&str> {
            items.iter().filter_map(|item| item.resource_id()).collect()
        }
        match self {
            ChartFieldValue::Diagnosis(items) => ids(items),
            ChartFieldValue::Conditions(items)
            | ChartFieldValue::Allergies(items)
            | ChartFieldValue::Medications(items)
            | ChartFieldValue::CptCodes(items) => ids(items),
            ChartFieldValue::Notes(items) => ids(items),
            ChartFieldValue::MedicalDecision(note) | ChartFieldValue::ChiefComplaint(note) => {
                note.resource_id().into_iter().collect()
            }
            ChartFieldValue::EmCode(code) => code.resource_id().into_iter().collect(),
        }
    }

    /// Copy of a list value with every entity matching `resource_id` removed.
    ///
    /// Scalar values cannot be filtered and yield `None`.
    pub fn without_resource(&self, resource_id: &str) -> Option<Self> {
        let filtered = match self {
            ChartFieldValue::Diagnosis(items) => {
                ChartFieldValue::Diagnosis(retain_others(items, resource_id))
            }
            ChartFieldValue::Conditions(items) => {
                ChartFieldValue::Conditions(retain_others(items, resource_id))
            }
            ChartFieldValue::Allergies(items) => {
                ChartFieldValue::Allergies(retain_others(items, resource_id))
            }
            ChartFieldValue::Medications(items) => {
                ChartFieldValue::Medications(retain_others(items, resource_id))
            }
            ChartFieldValue::CptCodes(items) => {
                ChartFieldValue::CptCodes(retain_others(items, resource_id))
            }
            ChartFieldValue::Notes(items) => ChartFieldValue::Notes(retain_others(items, resource_id)),
            ChartFieldValue::MedicalDecision(_)
            | ChartFieldValue::ChiefComplaint(_)
            | ChartFieldValue::EmCode(_) => return None,
        };
        Some(filtered)
    }

    /// Window of a list value; scalars are returned as they are
    pub fn paged(&self, offset: Option<usize>, count: Option<usize>) -> Self {
        match self {
            ChartFieldValue::Diagnosis(items) => ChartFieldValue::Diagnosis(page(items, offset, count)),
            ChartFieldValue::Conditions(items) => {
                ChartFieldValue::Conditions(page(items, offset, count))
            }
            ChartFieldValue::Allergies(items) => ChartFieldValue::Allergies(page(items, offset, count)),
            ChartFieldValue::Medications(items) => {
                ChartFieldValue::Medications(page(items, offset, count))
            }
            ChartFieldValue::CptCodes(items) => ChartFieldValue::CptCodes(page(items, offset, count)),
            ChartFieldValue::Notes(items) => ChartFieldValue::Notes(page(items, offset, count)),
            scalar => scalar.clone(),
        }
    }

    /// Appends list items of `other` or replaces a scalar with it
    pub fn merged_with(&self, other: ChartFieldValue) -> Result<Self> {
        fn concat<T: Clone>(a: &[T], b: Vec<T>) -> Vec<T> {
            a.iter().cloned().chain(b).collect()
        }
        let merged = match (self, other) {
            (ChartFieldValue::Diagnosis(a), ChartFieldValue::Diagnosis(b)) => {
                ChartFieldValue::Diagnosis(concat(a, b))
            }
            (ChartFieldValue::Conditions(a), ChartFieldValue::Conditions(b)) => {
                ChartFieldValue::Conditions(concat(a, b))
            }
            (ChartFieldValue::Allergies(a), ChartFieldValue::Allergies(b)) => {
                ChartFieldValue::Allergies(concat(a, b))
            }
            (ChartFieldValue::Medications(a), ChartFieldValue::Medications(b)) => {
                ChartFieldValue::Medications(concat(a, b))
            }
            (ChartFieldValue::CptCodes(a), ChartFieldValue::CptCodes(b)) => {
                ChartFieldValue::CptCodes(concat(a, b))
            }
            (ChartFieldValue::Notes(a), ChartFieldValue::Notes(b)) => {
                ChartFieldValue::Notes(concat(a, b))
            }
            (current, replacement) if current.field() == replacement.field() => replacement,
            (current, other) => {
                return Err(ChartError::InvalidChartData(format!(
                    "cannot merge {} into {}",
                    other.field(),
                    current.field()
                )));
            }
        };
        Ok(merged)
    }

    /// Fills in a fresh resource id for every entity that has none
    pub fn assign_missing_ids(&mut self, mut next_id: impl FnMut() -> String) {
        fn fill(slot: &mut Option<String>, next_id: &mut impl FnMut() -> String) {
            if slot.is_none() {
                *slot = Some(next_id());
            }
        }
        match self {
            ChartFieldValue::Diagnosis(items) => {
                items.iter_mut().for_each(|i| fill(&mut i.resource_id, &mut next_id))
            }
            ChartFieldValue::Conditions(items)
            | ChartFieldValue::Allergies(items)
            | ChartFieldValue::Medications(items)
            | ChartFieldValue::CptCodes(items) => {
                items.iter_mut().for_each(|i| fill(&mut i.resource_id, &mut next_id))
            }
            ChartFieldValue::Notes(items) => {
                items.iter_mut().for_each(|i| fill(&mut i.resource_id, &mut next_id))
            }
            ChartFieldValue::MedicalDecision(note) | ChartFieldValue::ChiefComplaint(note) => {
                fill(&mut note.resource_id, &mut next_id)
            }
            ChartFieldValue::EmCode(code) => fill(&mut code.resource_id, &mut next_id),
        }
    }

    /// Decodes the JSON payload of `field` into its typed value
    pub fn from_json(field: ChartField, value: Value) -> Result<Self> {
        let parsed = match field {
            ChartField::Diagnosis => ChartFieldValue::Diagnosis(serde_json::from_value(value)?),
            ChartField::Conditions => ChartFieldValue::Conditions(serde_json::from_value(value)?),
            ChartField::Allergies => ChartFieldValue::Allergies(serde_json::from_value(value)?),
            ChartField::Medications => ChartFieldValue::Medications(serde_json::from_value(value)?),
            ChartField::CptCodes => ChartFieldValue::CptCodes(serde_json::from_value(value)?),
            ChartField::Notes => ChartFieldValue::Notes(serde_json::from_value(value)?),
            ChartField::MedicalDecision => {
                ChartFieldValue::MedicalDecision(serde_json::from_value(value)?)
            }
            ChartField::ChiefComplaint => {
                ChartFieldValue::ChiefComplaint(serde_json::from_value(value)?)
            }
            ChartField::EmCode => ChartFieldValue::EmCode(serde_json::from_value(value)?),
        };
        Ok(parsed)
    }
}

/// Serializes as the bare payload; the field name lives in the enclosing map
impl Serialize for ChartFieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ChartFieldValue::Diagnosis(items) => items.serialize(serializer),
            ChartFieldValue::Conditions(items)
            | ChartFieldValue::Allergies(items)
            | ChartFieldValue::Medications(items)
            | ChartFieldValue::CptCodes(items) => items.serialize(serializer),
            ChartFieldValue::Notes(items) => items.serialize(serializer),
            ChartFieldValue::MedicalDecision(note) | ChartFieldValue::ChiefComplaint(note) => {
                note.serialize(serializer)
            }
            ChartFieldValue::EmCode(code) => code.serialize(serializer),
        }
    }
}
