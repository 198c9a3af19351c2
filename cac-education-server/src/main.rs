use cac_education_server::{AppConfig, create_app, telemetry::init_tracing};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = AppConfig::from_env()?;
    info!(
        ollama_url = %config.ollama.base_url,
        default_model = %config.ollama.default_model,
        "Configuration loaded"
    );

    let app = create_app(&config).await?;
    let listener = TcpListener::bind(config.bind_address()).await?;
    let addr = listener.local_addr()?;

    info!("CAC education service starting on {}", addr);
    info!("Service description: http://{}/", addr);
    info!("Health check endpoint: http://{}/health", addr);
    info!("Generation endpoint: POST http://{}/api/v1/generate-education", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
