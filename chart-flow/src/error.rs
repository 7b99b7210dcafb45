use thiserror::Error;

/// Errors raised while reading, mutating or reconciling chart data
#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Chart data request failed: {0}")]
    RequestFailed(String),

    #[error("Encounter not found: {0}")]
    EncounterNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Invalid chart data: {0}")]
    InvalidChartData(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ChartError>;
