//! Database operations for the notification outbox.
//!
//! Notifications are queued inside the same transaction as the state change
//! that triggered them, so a rolled-back order never leaves a stray message
//! behind. A background dispatcher drains the queue and records delivery
//! attempts here.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use green_grocer_core::{NotificationId, NotificationKind, NotificationStatus, OrderId, UserId};

use super::RepositoryError;
use crate::models::notification::Notification;

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for notification queries.
#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: i64,
    kind: NotificationKind,
    user_id: i64,
    order_id: Option<i64>,
    payload: serde_json::Value,
    status: NotificationStatus,
    attempts: i64,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: NotificationId::new(row.id),
            kind: row.kind,
            user_id: UserId::new(row.user_id),
            order_id: row.order_id.map(OrderId::new),
            payload: row.payload,
            status: row.status,
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
            sent_at: row.sent_at,
        }
    }
}

const SELECT_NOTIFICATION: &str =
    "SELECT id, kind, user_id, order_id, payload, status, attempts, last_error, created_at, \
     sent_at FROM notifications";

// =============================================================================
// Repository
// =============================================================================

/// Repository for notification outbox operations.
pub struct NotificationRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> NotificationRepository<'a> {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Oldest queued notifications, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn pending(&self, limit: i64) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "{SELECT_NOTIFICATION} WHERE status = 'queued' ORDER BY created_at LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Number of notifications still waiting to be sent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_pending(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE status = 'queued'",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Mark a notification as delivered.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the notification does not exist.
    pub async fn mark_sent(
        &self,
        id: NotificationId,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE notifications SET status = 'sent', sent_at = ?2, attempts = attempts + 1 \
             WHERE id = ?1",
        )
        .bind(id.as_i64())
        .bind(now)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Record a failed delivery attempt. The notification stays queued for
    /// retry until `max_attempts` is reached, at which point it is marked
    /// failed and the dispatcher stops picking it up.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the notification does not exist.
    pub async fn record_attempt_failure(
        &self,
        id: NotificationId,
        error: &str,
        max_attempts: i64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE notifications SET attempts = attempts + 1, last_error = ?2, \
             status = CASE WHEN attempts + 1 >= ?3 THEN 'failed' ELSE 'queued' END \
             WHERE id = ?1",
        )
        .bind(id.as_i64())
        .bind(error)
        .bind(max_attempts)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Transaction-scoped operations
    // =========================================================================

    /// Queue a notification within a caller-provided transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn queue(
        conn: &mut SqliteConnection,
        kind: NotificationKind,
        user_id: UserId,
        order_id: Option<OrderId>,
        payload: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO notifications (kind, user_id, order_id, payload, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(kind)
        .bind(user_id.as_i64())
        .bind(order_id.map(|id| id.as_i64()))
        .bind(payload)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(())
    }
}
