use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use simgate_core::model::ModelRegistry;
use simgate_worker::{StaleClaimReaper, WorkerConfig, WorkerPool};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "simgate_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = simgate_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    simgate_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Broker database ready");

    // Deployments register their hosted models here before starting the
    // pool; tasks for unregistered models terminate as FAIL envelopes.
    let models = Arc::new(ModelRegistry::new());

    let cancel = tokio_util::sync::CancellationToken::new();

    let reaper_handle = tokio::spawn(StaleClaimReaper::new(pool.clone()).run(cancel.clone()));
    let pool_handle = tokio::spawn(WorkerPool::new(pool, models, config).run(cancel.clone()));

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, draining worker loops");
    cancel.cancel();

    let _ = tokio::time::timeout(Duration::from_secs(30), pool_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), reaper_handle).await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
