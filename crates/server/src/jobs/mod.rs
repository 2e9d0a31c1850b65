//! Scheduled background jobs.
//!
//! Each job is guarded by its own mutex so a slow run never overlaps with
//! the next tick or a manual trigger. Failures are reported as job results
//! and never take down the scheduler loop. All jobs can also be invoked
//! on demand through `POST /admin/jobs/{name}` and the CLI.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::instrument;

use crate::db::{ProductRepository, RepositoryError};
use crate::error::{AppError, DomainError};
use crate::notify::NotificationDispatcher;
use crate::services::{OrderService, StockService};
use crate::state::AppState;

/// The background jobs, with their schedule cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Cancel stale unpaid orders and release their stock. Hourly.
    CleanupOrphaned,
    /// Reconcile aggregate stock against batch inventory. Daily.
    SyncInventory,
    /// Mark expired batches and realign stock. Daily.
    UpdateExpiry,
    /// Drain the notification outbox. Every 30 seconds.
    DispatchNotifications,
}

impl JobKind {
    /// Every job, in scheduling order.
    pub const ALL: [Self; 4] = [
        Self::DispatchNotifications,
        Self::CleanupOrphaned,
        Self::SyncInventory,
        Self::UpdateExpiry,
    ];

    /// The job's name as used in the API and CLI.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CleanupOrphaned => "cleanup_orphaned",
            Self::SyncInventory => "sync_inventory",
            Self::UpdateExpiry => "update_expiry",
            Self::DispatchNotifications => "dispatch_notifications",
        }
    }

    const fn period(self) -> Duration {
        match self {
            Self::DispatchNotifications => Duration::from_secs(30),
            Self::CleanupOrphaned => Duration::from_secs(60 * 60),
            Self::SyncInventory | Self::UpdateExpiry => Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cleanup_orphaned" => Ok(Self::CleanupOrphaned),
            "sync_inventory" => Ok(Self::SyncInventory),
            "update_expiry" => Ok(Self::UpdateExpiry),
            "dispatch_notifications" => Ok(Self::DispatchNotifications),
            other => Err(format!("unknown job '{other}'")),
        }
    }
}

/// Summary of one completed job run.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    /// Which job ran.
    pub job: &'static str,
    /// Per-job summary counts.
    pub summary: serde_json::Value,
}

/// Errors from running a job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job is already in progress.
    #[error("job is already running")]
    AlreadyRunning,

    /// A domain operation inside the job failed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A database operation inside the job failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<JobError> for AppError {
    fn from(e: JobError) -> Self {
        match e {
            JobError::AlreadyRunning => Self::Conflict(e.to_string()),
            JobError::Domain(e) => Self::Domain(e),
            JobError::Repository(e) => Self::Database(e),
        }
    }
}

/// Run one job to completion.
///
/// # Errors
///
/// Returns `JobError::AlreadyRunning` when the job's lock is held, or the
/// underlying failure otherwise.
#[instrument(skip_all, fields(job = job.name()))]
pub async fn run(state: &AppState, job: JobKind) -> Result<JobOutcome, JobError> {
    match job {
        JobKind::CleanupOrphaned => run_cleanup_orphaned(state).await,
        JobKind::SyncInventory => run_sync_inventory(state).await,
        JobKind::UpdateExpiry => run_update_expiry(state).await,
        JobKind::DispatchNotifications => run_dispatch_notifications(state).await,
    }
}

async fn run_cleanup_orphaned(state: &AppState) -> Result<JobOutcome, JobError> {
    let _guard = state
        .jobs()
        .cleanup_orphaned
        .try_lock()
        .map_err(|_| JobError::AlreadyRunning)?;

    let service = OrderService::new(state.pool(), state.config().shipping_flat_rate);
    let cancelled = service
        .cleanup_orphaned(state.config().orphan_cleanup_hours, Utc::now())
        .await?;

    Ok(JobOutcome {
        job: JobKind::CleanupOrphaned.name(),
        summary: json!({ "cancelled": cancelled }),
    })
}

async fn run_sync_inventory(state: &AppState) -> Result<JobOutcome, JobError> {
    let _guard = state
        .jobs()
        .sync_inventory
        .try_lock()
        .map_err(|_| JobError::AlreadyRunning)?;

    let report = StockService::new(state.pool()).sync(Utc::now()).await?;

    Ok(JobOutcome {
        job: JobKind::SyncInventory.name(),
        summary: json!({
            "products_checked": report.products_checked,
            "corrected": report.corrected,
        }),
    })
}

async fn run_update_expiry(state: &AppState) -> Result<JobOutcome, JobError> {
    let _guard = state
        .jobs()
        .update_expiry
        .try_lock()
        .map_err(|_| JobError::AlreadyRunning)?;

    let now = Utc::now();
    let expired = ProductRepository::new(state.pool())
        .mark_expired_batches(now)
        .await?;
    // Newly expired batches left the sellable totals; realign stock.
    let report = StockService::new(state.pool()).sync(now).await?;

    Ok(JobOutcome {
        job: JobKind::UpdateExpiry.name(),
        summary: json!({
            "batches_expired": expired,
            "stock_corrected": report.corrected,
        }),
    })
}

async fn run_dispatch_notifications(state: &AppState) -> Result<JobOutcome, JobError> {
    let _guard = state
        .jobs()
        .dispatch_notifications
        .try_lock()
        .map_err(|_| JobError::AlreadyRunning)?;

    let dispatcher = NotificationDispatcher::new(state.pool(), state.whatsapp());
    let report = dispatcher.dispatch_pending().await?;

    Ok(JobOutcome {
        job: JobKind::DispatchNotifications.name(),
        summary: json!({ "sent": report.sent, "failed": report.failed }),
    })
}

/// Spawn one interval loop per job. The handles live as long as the server.
pub fn spawn_scheduler(state: &AppState) -> Vec<JoinHandle<()>> {
    JobKind::ALL
        .iter()
        .map(|&job| spawn_job_loop(state.clone(), job))
        .collect()
}

fn spawn_job_loop(state: AppState, job: JobKind) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(job.period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match run(&state, job).await {
                Ok(outcome) => {
                    tracing::debug!(job = outcome.job, summary = %outcome.summary, "Job finished");
                }
                // A manual trigger beat the tick; the next one will run.
                Err(JobError::AlreadyRunning) => {}
                Err(e) => {
                    tracing::error!(job = job.name(), error = %e, "Job failed");
                }
            }
        }
    })
}
