use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vibe_api::Server;
use vibe_core::{log_environment_status, Settings};

#[tokio::main]
async fn main() -> vibe_core::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vibe_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    log_environment_status(&settings);

    let validation = settings.validate();
    for warning in &validation.warnings {
        warn!("{}", warning);
    }
    for error in &validation.errors {
        error!("{}", error);
    }

    let server = Server::new(settings)?;
    server.run().await
}
