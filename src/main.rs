use tracing::{error, info};

use wduc_etl::config::{config_path_from_env, EtlConfig};
use wduc_etl::services::datafusion::EtlSession;
use wduc_etl::services::EtlService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config_path = config_path_from_env();
    let config = EtlConfig::load(&config_path).map_err(|e| {
        error!("Failed to load configuration from {}: {}", config_path, e);
        e
    })?;

    info!("Writing datasets under {}", config.output.base_path);

    let session = EtlSession::open(&config).await.map_err(|e| {
        error!("Failed to open engine session: {}", e);
        e
    })?;

    let summary = EtlService::new(&config, &session).run().await.map_err(|e| {
        error!("Pipeline failed: {}", e);
        e
    })?;

    info!(
        "Run {} finished: {}",
        summary.id,
        serde_json::to_string(&summary)?
    );

    Ok(())
}
