use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use chart_flow::{
    ChartDataResponse, ChartDataStore, ChartError, InMemoryChartDataStore, ZambdaChartDataStore,
    fhir::Appointment, is_in_person_appointment,
};
use chrono::{DateTime, FixedOffset};
use dashmap::DashMap;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    config::ServiceConfig,
    models::{DeleteChartDataResponse, GetTelemedAppointmentsResponse},
    validation::{
        ValidationError, validate_delete_chart_data, validate_get_appointments,
        validate_get_chart_data, validate_save_chart_data,
    },
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(error: &ValidationError) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Invalid request", "details": error.to_string() })),
    )
}

fn chart_error(message: &str, error: &ChartError) -> ApiError {
    let status = match error {
        ChartError::EncounterNotFound(_) | ChartError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
        ChartError::InvalidChartData(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({
            "error": message,
            "details": error.to_string()
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub chart_store: Arc<dyn ChartDataStore>,
    pub appointments: Arc<DashMap<String, Appointment>>,
}

impl AppState {
    pub fn new(chart_store: Arc<dyn ChartDataStore>) -> Self {
        Self {
            chart_store,
            appointments: Arc::new(DashMap::new()),
        }
    }

    pub fn add_appointment(&self, appointment: Appointment) {
        let id = appointment
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.appointments.insert(id, appointment);
    }
}

pub async fn create_app(config: &ServiceConfig) -> anyhow::Result<Router> {
    let app_state = create_app_state(config).await?;
    Ok(build_router(app_state))
}

fn chart_store(config: &ServiceConfig) -> anyhow::Result<Arc<dyn ChartDataStore>> {
    let Some(project_api) = &config.project_api else {
        info!("Serving chart data from memory");
        return Ok(Arc::new(InMemoryChartDataStore::new()));
    };

    info!("Forwarding chart data to {}", project_api);
    let mut store = ZambdaChartDataStore::new(project_api.as_str())?;
    if let Some(token) = &config.project_access_token {
        store = store.with_access_token(token.as_str());
    }
    Ok(Arc::new(store))
}

async fn create_app_state(config: &ServiceConfig) -> anyhow::Result<AppState> {
    let app_state = AppState::new(chart_store(config)?);

    if let Some(path) = &config.appointments_file {
        let raw = tokio::fs::read_to_string(path).await?;
        let appointments: Vec<Appointment> = serde_json::from_str(&raw)?;
        info!(
            "Loaded {} appointment(s) from {}",
            appointments.len(),
            path.display()
        );
        appointments
            .into_iter()
            .for_each(|appointment| app_state.add_appointment(appointment));
    }

    Ok(app_state)
}

/// Appointments without a parseable start sort first
fn start_instant(appointment: &Appointment) -> Option<DateTime<FixedOffset>> {
    appointment
        .start
        .as_deref()
        .and_then(|start| DateTime::parse_from_rfc3339(start).ok())
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/zambda/get-chart-data/execute", post(get_chart_data))
        .route("/zambda/delete-chart-data/execute", post(delete_chart_data))
        .route("/zambda/save-chart-data/execute", post(save_chart_data))
        .route(
            "/zambda/telemed-get-appointments/execute",
            post(get_telemed_appointments),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Chart Data Service",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /zambda/get-chart-data/execute": "Read chart data of an encounter",
            "POST /zambda/delete-chart-data/execute": "Delete chart resources by id",
            "POST /zambda/save-chart-data/execute": "Append or replace chart data",
            "POST /zambda/telemed-get-appointments/execute": "List telemed appointments",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn get_chart_data(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<ChartDataResponse> {
    let request = validate_get_chart_data(&body).map_err(|e| {
        warn!("Rejected get-chart-data request: {}", e);
        bad_request_error(&e)
    })?;

    info!(
        "Fetching chart data for encounter {} ({} field(s) requested)",
        request.encounter_id,
        request.requested_fields.len()
    );

    state.chart_store.fetch(&request).await.map(Json).map_err(|e| {
        error!(
            "Failed to fetch chart data for {}: {}",
            request.encounter_id, e
        );
        chart_error("Failed to fetch chart data", &e)
    })
}

async fn delete_chart_data(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<DeleteChartDataResponse> {
    let deletion = validate_delete_chart_data(&body).map_err(|e| {
        warn!("Rejected delete-chart-data request: {}", e);
        bad_request_error(&e)
    })?;

    match state.chart_store.delete(&deletion).await {
        Ok(()) => Ok(Json(DeleteChartDataResponse {
            encounter_id: deletion.encounter_id.clone(),
            deleted: deletion.resource_count(),
        })),
        Err(e) => {
            error!(
                "Failed to delete chart data for {}: {}",
                deletion.encounter_id, e
            );
            Err(chart_error("Failed to delete chart data", &e))
        }
    }
}

async fn save_chart_data(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<ChartDataResponse> {
    let request = validate_save_chart_data(&body).map_err(|e| {
        warn!("Rejected save-chart-data request: {}", e);
        bad_request_error(&e)
    })?;

    state
        .chart_store
        .save(&request.encounter_id, request.data)
        .await
        .map(Json)
        .map_err(|e| {
            error!(
                "Failed to save chart data for {}: {}",
                request.encounter_id, e
            );
            chart_error("Failed to save chart data", &e)
        })
}

async fn get_telemed_appointments(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<GetTelemedAppointmentsResponse> {
    let patient_id = validate_get_appointments(&body).map_err(|e| {
        warn!("Rejected telemed-get-appointments request: {}", e);
        bad_request_error(&e)
    })?
    .patient_id;

    let mut appointments: Vec<Appointment> = state
        .appointments
        .iter()
        .map(|entry| entry.value().clone())
        .filter(|appointment| !is_in_person_appointment(appointment))
        .filter(|appointment| match &patient_id {
            Some(patient_id) => appointment.patient_id() == Some(patient_id.as_str()),
            None => true,
        })
        .collect();
    appointments.sort_by_key(start_instant);

    info!(
        "Found {} telemed appointment(s) for patient {:?}",
        appointments.len(),
        patient_id
    );

    Ok(Json(GetTelemedAppointmentsResponse { appointments }))
}
