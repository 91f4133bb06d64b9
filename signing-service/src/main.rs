use signing_service::config::SigningConfig;
use signing_service::services::metrics::init_metrics;
use signing_service::startup::Application;
use service_core::observability::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = SigningConfig::from_env()?;
    init_tracing(&config.service_name, &config.log_level);
    init_metrics();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "Starting signing-service"
    );

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;
    Ok(())
}
