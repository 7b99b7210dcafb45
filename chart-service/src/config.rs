//! Service configuration, resolved once at startup from secrets or the environment.

use std::path::PathBuf;

use crate::secrets::{SecretError, SecretKey, Secrets, get_optional_secret};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_ENVIRONMENT: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub port: u16,
    pub environment: String,
    /// Upstream zambda project to forward chart data to; in-memory when unset
    pub project_api: Option<String>,
    pub project_access_token: Option<String>,
    pub appointments_file: Option<PathBuf>,
}

impl ServiceConfig {
    pub fn load(secrets: Option<&Secrets>) -> Result<Self, SecretError> {
        let port = match get_optional_secret(SecretKey::Port, secrets) {
            Some(raw) => raw.parse::<u16>().map_err(|_| SecretError::Invalid {
                key: SecretKey::Port.to_string(),
                value: raw.clone(),
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            port,
            environment: get_optional_secret(SecretKey::Environment, secrets)
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            project_api: get_optional_secret(SecretKey::ProjectApi, secrets),
            project_access_token: get_optional_secret(SecretKey::ProjectAccessToken, secrets),
            appointments_file: get_optional_secret(SecretKey::AppointmentsFile, secrets)
                .map(PathBuf::from),
        })
    }
}
