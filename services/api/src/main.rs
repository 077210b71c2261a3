use anyhow::Result;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use api::{
    config::ServerConfig,
    routes,
    state::{AppState, Stores},
};
use auth::{SessionConfig, TaskQueueConfig, scheduler::start_session_purge};
use common::{
    crypto::{Cipher, CryptoConfig},
    database::{DatabaseConfig, health_check, init_pool},
    error::DatabaseError,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting API service");

    let server_config = ServerConfig::from_env();
    let session_config = SessionConfig::from_env();
    let queue_config = TaskQueueConfig::from_env();

    // Without the data key no email can be sealed or opened
    let cipher = Cipher::new(&CryptoConfig::from_env()?)?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    sqlx::migrate!()
        .run(&pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    info!("Database migrations applied");

    let (app_state, worker) = AppState::build(
        Stores::postgres(pool),
        cipher,
        session_config,
        queue_config.capacity,
    );

    let mut purge = start_session_purge(
        app_state.sessions.clone(),
        &server_config.session_purge_schedule,
    )
    .await?;

    // Start the web server
    let app = routes::create_router(app_state);

    let address = server_config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("API service listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = purge.shutdown().await {
        error!("Failed to stop session purge scheduler: {}", e);
    }

    let report = worker
        .shutdown(
            queue_config.shutdown_mode,
            Duration::from_secs(queue_config.drain_timeout_secs),
        )
        .await;
    info!(
        "Background tasks at shutdown: {} completed, {} discarded",
        report.completed, report.discarded
    );

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
