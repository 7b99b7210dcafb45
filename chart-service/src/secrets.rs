use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Secrets handed to a handler; when absent, the process environment is used instead
pub type Secrets = HashMap<String, String>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("Secret or Environment Variable with key {0} was not set.")]
    Missing(String),
    #[error("Secret {key} has an invalid value: {value}")]
    Invalid { key: String, value: String },
    #[error("Secrets file {path} could not be loaded: {reason}")]
    Unreadable { path: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKey {
    Environment,
    Port,
    ProjectApi,
    ProjectAccessToken,
    AppointmentsFile,
    /// JSON object of secrets; only ever read from the environment
    SecretsFile,
}

impl SecretKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretKey::Environment => "ENVIRONMENT",
            SecretKey::Port => "PORT",
            SecretKey::ProjectApi => "PROJECT_API",
            SecretKey::ProjectAccessToken => "PROJECT_ACCESS_TOKEN",
            SecretKey::AppointmentsFile => "APPOINTMENTS_FILE",
            SecretKey::SecretsFile => "SECRETS_FILE",
        }
    }
}

impl AsRef<str> for SecretKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Looks `key` up in `secrets` when given, otherwise in the environment
pub fn get_optional_secret(key: impl AsRef<str>, secrets: Option<&Secrets>) -> Option<String> {
    let key = key.as_ref();
    match secrets {
        Some(secrets) => secrets.get(key).cloned(),
        None => std::env::var(key).ok(),
    }
}

pub fn get_secret(key: impl AsRef<str>, secrets: Option<&Secrets>) -> Result<String, SecretError> {
    let key = key.as_ref();
    get_optional_secret(key, secrets).ok_or_else(|| SecretError::Missing(key.to_string()))
}

/// Reads a flat JSON object of string secrets, as kept per environment next to the zambdas
pub fn load_secrets_file(path: impl AsRef<Path>) -> Result<Secrets, SecretError> {
    let path = path.as_ref();
    let unreadable = |reason: String| SecretError::Unreadable {
        path: path.display().to_string(),
        reason,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| unreadable(e.to_string()))
}
