use banksampah_api::Server;
use banksampah_core::ConfigManager;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigManager::new()?;
    let settings = config.settings().clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        env = %config.env(),
        config_dir = %config.config_dir().display(),
        "Configuration loaded"
    );

    let server = Server::new(settings).await?;
    server.run().await
}
