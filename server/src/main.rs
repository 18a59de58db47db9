use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod database;
mod delivery;
mod error;
mod fees;
mod routes;
mod scheduler;
mod utils;
mod weather;

use config::Config;
use database::Database;
use routes::{create_router, AppState};
use scheduler::ImportScheduler;
use weather::WeatherImporter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "delivery_fee_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let database = Arc::new(Database::new(pool));
    database.init_tables().await?;
    if config.seed_default_fees {
        database.seed_default_fees().await?;
    }

    let importer = Arc::new(WeatherImporter::new(&config, database.clone())?);
    let scheduler = Arc::new(ImportScheduler::new(&config.import_cron, move || {
        let importer = importer.clone();
        async move { importer.run_import().await }
    })?);

    // Fetch once right away, then keep to the schedule
    scheduler.trigger_now();
    scheduler.start().await;

    let state = AppState {
        database,
        scheduler: scheduler.clone(),
    };

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!("Server starting on http://{}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
