//! Vietnam Hearts scheduler
//!
//! HTTP server entry point

use std::net::SocketAddr;
use tracing::{error, info, warn};

use HeartsScheduler::{
    config::Settings,
    database::{create_pool, run_migrations, DatabaseService, PoolOptions},
    router::build_router,
    services::ServiceFactory,
    state::{AppState, RATE_LIMIT_CLEANUP_INTERVAL},
    utils::logging,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;
    settings.validate()?;

    // Initialize logging; the guard flushes the file writer on exit
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!(
        version = HeartsScheduler::VERSION,
        environment = %settings.server.environment,
        "Starting Vietnam Hearts scheduler..."
    );

    info!("Connecting to database...");
    let pool = create_pool(&PoolOptions::from(&settings.database)).await?;
    run_migrations(&pool).await?;
    let database = DatabaseService::new(pool);

    info!("Initializing services...");
    let services = ServiceFactory::new(settings.clone(), database).await?;
    let defaults = services.runtime.initialize_defaults().await?;
    info!(inserted = defaults, "Runtime settings ready");

    let health = services.health_check().await;
    for issue in health.get_issues() {
        warn!(issue = %issue, "Startup health issue");
    }

    let state = AppState::new(services);
    let cleanup = state.spawn_rate_limit_cleanup(RATE_LIMIT_CLEANUP_INTERVAL);
    let app = build_router(state);

    let addr: SocketAddr = settings.bind_address().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Server listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cleanup.abort();
    info!("Vietnam Hearts scheduler has been shut down.");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, starting graceful shutdown"),
        () = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}
