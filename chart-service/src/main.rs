use chart_service::{
    SecretKey, ServiceConfig, create_app, get_optional_secret, load_secrets_file,
};
use tokio::net::TcpListener;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let secrets = match get_optional_secret(SecretKey::SecretsFile, None) {
        Some(path) => {
            info!("Reading secrets from {}", path);
            Some(load_secrets_file(&path)?)
        }
        None => None,
    };
    let config = ServiceConfig::load(secrets.as_ref())?;
    let app = create_app(&config).await?;
    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    let addr = listener.local_addr()?;

    info!(
        "Chart Data Service ({}) starting on {}",
        config.environment, addr
    );
    info!("Health check endpoint: http://{}/health", addr);
    info!("Zambda endpoints: POST http://{}/zambda/{{name}}/execute", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
