//! Run a background job once, in the foreground.
//!
//! # Usage
//!
//! ```bash
//! gg-cli job cleanup_orphaned
//! gg-cli job sync_inventory
//! gg-cli job update_expiry
//! gg-cli job dispatch_notifications
//! ```
//!
//! Loads the full server configuration, so the same environment the server
//! runs with works here. Job locks are per-process: a CLI run can overlap a
//! scheduler run inside a live server, so prefer `POST /admin/jobs/{name}`
//! when the server is up.

use thiserror::Error;
use tracing::info;

use green_grocer_server::config::{ConfigError, ServerConfig};
use green_grocer_server::db;
use green_grocer_server::jobs::{self, JobError, JobKind};
use green_grocer_server::notify::NotifyError;
use green_grocer_server::state::AppState;

/// Errors that can occur when running a job from the CLI.
#[derive(Debug, Error)]
pub enum JobCommandError {
    /// Unknown job name.
    #[error("{0}")]
    UnknownJob(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Gateway client could not be constructed.
    #[error("Gateway error: {0}")]
    Gateway(#[from] NotifyError),

    /// The job itself failed.
    #[error("Job failed: {0}")]
    Job(#[from] JobError),
}

/// Parse a job name and run it to completion.
///
/// # Errors
///
/// Returns `JobCommandError` if the name is unknown, the configuration is
/// incomplete, or the job fails.
pub async fn run(name: &str) -> Result<(), JobCommandError> {
    let job: JobKind = name.parse().map_err(JobCommandError::UnknownJob)?;

    let config = ServerConfig::from_env()?;
    let pool = db::create_pool(&config.database_path).await?;
    let state = AppState::new(config, pool)?;

    info!("Running job '{}'...", job.name());
    let outcome = jobs::run(&state, job).await?;

    info!("Job finished: {}", outcome.summary);
    Ok(())
}
