use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use simgate_api::background::RegistryRefresher;
use simgate_api::config::ApiConfig;
use simgate_api::{routes, state::AppState};
use simgate_backends::cluster::{HttpScheduler, LocalScheduler, SchedulerClient};
use simgate_backends::ephemeral::{ProcessRuntime, ProcessRuntimeConfig};
use simgate_backends::{Backends, ClusterBackend, EphemeralBackend, FsParamStore, QueueBackend};
use simgate_core::model::ModelRegistry;
use simgate_core::registry::ProjectRegistry;
use simgate_delivery::{CompletionDelivery, FsOutputStore, UpstreamConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "simgate_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ApiConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded gateway configuration");

    // --- Broker database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = simgate_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    simgate_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    simgate_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Broker database ready");

    // --- Project registry ---
    let registry = Arc::new(
        ProjectRegistry::load(&config.registry_path).expect("Failed to load project registry"),
    );
    tracing::info!(projects = registry.len(), path = %config.registry_path, "Project registry loaded");

    // --- Completion delivery ---
    let delivery = Arc::new(CompletionDelivery::new(
        UpstreamConfig {
            base_url: config.upstream_url.clone(),
            token: config.upstream_token.clone(),
        },
        Arc::new(FsOutputStore::new(&config.outputs_dir)),
    ));

    // --- Backend adapters ---
    // Deployments register their hosted models here; the gateway itself
    // executes nothing, so an empty registry is correct for the binary.
    let models = Arc::new(ModelRegistry::new());

    let scheduler: Arc<dyn SchedulerClient> = match &config.scheduler_url {
        Some(url) => {
            tracing::info!(scheduler_url = %url, "Using remote cluster scheduler");
            Arc::new(HttpScheduler::new(url.clone()))
        }
        None => {
            tracing::info!("No scheduler configured, executing cluster submissions in-process");
            Arc::new(LocalScheduler::new(Arc::clone(&models)))
        }
    };

    let runtime = Arc::new(ProcessRuntime::new(ProcessRuntimeConfig {
        runner_bin: config.runner_bin.clone().into(),
        callback_url: config.callback_url.clone(),
        callback_token: config.callback_token.clone(),
        upstream_base_url: config.upstream_url.clone(),
        upstream_token: config.upstream_token.clone(),
        outputs_dir: config.outputs_dir.clone().into(),
    }));

    let backends = Backends {
        queue: QueueBackend::new(pool.clone()),
        cluster: Arc::new(ClusterBackend::new(scheduler, Arc::clone(&delivery))),
        ephemeral: Arc::new(EphemeralBackend::new(
            runtime,
            Arc::new(FsParamStore::new(&config.params_dir)),
        )),
    };

    // --- Background registry refresh ---
    let refresh_cancel = tokio_util::sync::CancellationToken::new();
    let refresher = RegistryRefresher::new(
        Arc::clone(&registry),
        Duration::from_secs(config.registry_refresh_secs),
    );
    let refresher_handle = tokio::spawn(refresher.run(refresh_cancel.clone()));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        registry,
        backends,
    };

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        .merge(routes::router())
        // -- Middleware stack (applied bottom-up) --
        // Panic recovery: catch panics and return 500.
        .layer(CatchPanicLayer::new())
        // Request timeout: callers never hang past their deadline.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Propagate request ID to response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        // Shared state.
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting gateway");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Gateway stopped accepting connections, cleaning up");

    refresh_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), refresher_handle).await;
    tracing::info!("Registry refresher stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the gateway
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
