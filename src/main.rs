use anyhow::Context;
use line_protection_api::config::Config;
use line_protection_api::routes;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use tracing_subscriber::EnvFilter;

async fn connect_database(db_url: &str) -> anyhow::Result<DatabaseConnection> {
    let db = Database::connect(db_url)
        .await
        .context("Could not connect to the database")?;
    db.ping().await.context("Database did not answer ping")?;
    tracing::info!("Connected to the database");

    Migrator::up(&db, None)
        .await
        .context("Failed to run migrations")?;

    // Left commented here in case of need to downgrade
    // Migrator::down(&db, Some(1)).await?;

    tracing::info!("DB migrations complete");
    Ok(db)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration and environment variables to pass to the application
    let config: Config = Config::from_env();

    let db = match &config.db_url {
        Some(db_url) => Some(connect_database(db_url).await?),
        None => {
            tracing::warn!("No database configured, submissions will not be recorded");
            None
        }
    };

    if !std::path::Path::new(&config.template_path).is_file() {
        tracing::warn!(
            "Template workbook '{}' not found; uploads will fail until it exists",
            config.template_path
        );
    }

    tracing::info!(
        "Starting server {} ({} deployment) ...",
        config.app_name,
        config.deployment.to_uppercase()
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Could not bind {}", config.bind_addr))?;
    tracing::info!("Listening on {}", config.bind_addr);

    let router = routes::build_router(db, &config);
    axum::serve(listener, router.into_make_service())
        .await
        .context("Server error")?;

    Ok(())
}
