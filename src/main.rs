use std::sync::Arc;

use anyhow::Result;
use sea_orm_migration::MigratorTrait;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{prelude::*, EnvFilter};

use trackd::api::{self, AppState};
use trackd::config::Config;
use trackd::db;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize variables
    let log_level = config.log_level();
    let log_dir = &config.logging.dir;

    // Create log directory if it doesn't exist
    std::fs::create_dir_all(log_dir)?;

    // Setup file appender (daily rotation)
    let file_appender = tracing_appender::rolling::daily(log_dir, "trackd.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Use local time for log timestamps
    let local_timer = ChronoLocal::rfc_3339();

    // Setup stdout layer with local time
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .with_timer(local_timer.clone());

    // Setup file layer with local time
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_timer(local_timer)
        .with_writer(non_blocking);

    // Filter layer based on config
    let filter_layer = EnvFilter::from_default_env()
        .add_directive(log_level.into())
        .add_directive("sqlx=warn".parse().unwrap())
        .add_directive("sea_orm=warn".parse().unwrap());

    // Combine layers
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!("Starting trackd...");
    info!("Logs are written to: {}", log_dir);

    // Connect to database
    let conn = db::establish_connection(&config.database.url).await?;
    info!("Database connection established");

    // Run migrations
    migration::Migrator::up(&conn, None).await?;
    info!("✅ Database migrations completed");

    // Initialize repository
    let repo = Arc::new(db::repo::Repo::new(conn.clone()));

    // Test database connection
    repo.ping().await?;
    info!("✅ Database ping successful");

    let bind_address = config.server.bind_address.clone();
    let state = AppState {
        repo,
        config: Arc::new(config),
    };

    api::serve(state, &bind_address).await?;

    info!("✅ Shutdown complete");
    Ok(())
}
