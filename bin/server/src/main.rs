use botdeck_server::{
    config::ServerConfig, db::BotRepository, routes, state::build_state,
    telegram::TelegramConnector,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!(worker_id = %config.worker_id, "Loaded configuration");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    let connector = TelegramConnector::new(
        &config.bots.telegram_api_url,
        Duration::from_secs(config.bots.poll_timeout_secs),
    )
    .expect("failed to build bot platform client");

    let state = build_state(
        &config,
        Arc::new(BotRepository::new(db_pool)),
        Arc::new(connector),
    )
    .expect("failed to build application state");
    let state = Arc::new(state);

    // Restart bots this worker owned before the last shutdown
    match state.service.restore().await {
        Ok(summary) if summary.failed > 0 => {
            tracing::warn!(
                restored = summary.restored,
                failed = summary.failed,
                "Some bots could not be restored"
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to restore bots on startup");
        }
    }

    let app = routes::router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind listener");
    tracing::info!("listening on http://{}", &config.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    state.service.shutdown().await;
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
