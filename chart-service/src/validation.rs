//! Parsing and validation of zambda request bodies.

use chart_flow::{ChartDataDeletion, ChartDataRequest, SaveChartDataRequest};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::GetTelemedAppointmentsRequest;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("No request body provided")]
    MissingBody,
    #[error("Request body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ValidationError> {
    if body.trim().is_empty() {
        return Err(ValidationError::MissingBody);
    }
    Ok(serde_json::from_str(body)?)
}

fn require_encounter(encounter_id: &str) -> Result<(), ValidationError> {
    if encounter_id.trim().is_empty() {
        return Err(ValidationError::MissingParameter("encounterId"));
    }
    Ok(())
}

/// A missing body is accepted and means "no patient filter"
pub fn validate_get_appointments(
    body: &str,
) -> Result<GetTelemedAppointmentsRequest, ValidationError> {
    if body.trim().is_empty() {
        return Ok(GetTelemedAppointmentsRequest { patient_id: None });
    }
    parse_body(body)
}

pub fn validate_get_chart_data(body: &str) -> Result<ChartDataRequest, ValidationError> {
    let request: ChartDataRequest = parse_body(body)?;
    require_encounter(&request.encounter_id)?;
    Ok(request)
}

pub fn validate_delete_chart_data(body: &str) -> Result<ChartDataDeletion, ValidationError> {
    let request: ChartDataDeletion = parse_body(body)?;
    require_encounter(&request.encounter_id)?;
    if request.resource_count() == 0 {
        return Err(ValidationError::InvalidParameter {
            name: "resources",
            reason: "at least one resource must be named".to_string(),
        });
    }
    if let Some(blank) = request
        .targets
        .iter()
        .find(|(_, refs)| refs.iter().any(|r| r.resource_id.trim().is_empty()))
    {
        return Err(ValidationError::InvalidParameter {
            name: "resourceId",
            reason: format!("blank resource id in {}", blank.0),
        });
    }
    Ok(request)
}

pub fn validate_save_chart_data(body: &str) -> Result<SaveChartDataRequest, ValidationError> {
    let request: SaveChartDataRequest = parse_body(body)?;
    require_encounter(&request.encounter_id)?;
    if request.data.is_empty() {
        return Err(ValidationError::InvalidParameter {
            name: "chartData",
            reason: "nothing to save".to_string(),
        });
    }
    Ok(request)
}
