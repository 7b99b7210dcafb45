pub mod config;
pub mod models;
pub mod secrets;
pub mod service;
pub mod validation;

pub use config::ServiceConfig;
pub use models::*;
pub use secrets::{
    SecretError, SecretKey, Secrets, get_optional_secret, get_secret, load_secrets_file,
};
pub use service::{AppState, build_router, create_app};
