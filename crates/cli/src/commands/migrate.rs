//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! gg-cli migrate run
//! ```
//!
//! # Environment Variables
//!
//! - `GROCER_DATABASE_PATH` - `SQLite` database file path (falls back to
//!   `DATABASE_PATH`)

use thiserror::Error;
use tracing::info;

use green_grocer_server::db;

/// Errors that can occur while running migrations.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply all pending migrations.
///
/// The database file is created if it does not exist yet.
///
/// # Errors
///
/// Returns `MigrateError` if the database path is not configured or a
/// migration fails.
pub async fn run() -> Result<(), MigrateError> {
    dotenvy::dotenv().ok();

    let database_path = database_path()?;

    info!("Connecting to {database_path}...");
    let pool = db::create_pool(&database_path).await?;

    info!("Running migrations...");
    db::MIGRATOR.run(&pool).await?;

    info!("Migrations complete!");
    Ok(())
}

fn database_path() -> Result<String, MigrateError> {
    std::env::var("GROCER_DATABASE_PATH")
        .or_else(|_| std::env::var("DATABASE_PATH"))
        .map_err(|_| MigrateError::MissingEnvVar("GROCER_DATABASE_PATH"))
}
