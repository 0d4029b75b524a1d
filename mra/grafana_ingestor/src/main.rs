use log::*;
use mra_common_logger::setup_logger;
use mra_grafana_ingestor::config;
use mra_grafana_ingestor::driver::IngestorContext;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ingestor_config = config::build_config_from_env()?;

    let log_guard = setup_logger(&ingestor_config.logger)?;
    let context = IngestorContext::new(Some(log_guard));

    info!("Starting MRA Grafana Ingestor");

    mra_grafana_ingestor::start(ingestor_config, &context, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for the interrupt signal. Err: {}", err);
            std::future::pending::<()>().await;
        }
    })
    .await?;

    Ok(())
}
