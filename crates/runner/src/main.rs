use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use simgate_core::model::ModelRegistry;
use simgate_runner::{run, BootConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "simgate_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BootConfig::from_env();
    tracing::info!(
        job_id = %config.job_id,
        owner = %config.owner,
        application = %config.application,
        action = %config.action,
        "Runner booted",
    );

    // Deployments register their hosted models here; a boot without a
    // matching model self-reports a FAIL envelope and exits cleanly.
    let models = Arc::new(ModelRegistry::new());

    run(config, models).await;
}
