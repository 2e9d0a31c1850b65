//! Database operations for the audit log.
//!
//! Writes ride inside the transaction of the change they describe, so an
//! audit row exists exactly when the change it records committed.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use green_grocer_core::UserId;

use super::RepositoryError;
use crate::models::audit::{AuditDiff, AuditEntry};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for audit log queries.
#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    entity_type: String,
    entity_id: i64,
    action: String,
    changes: serde_json::Value,
    actor_user_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = RepositoryError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let changes: AuditDiff = serde_json::from_value(row.changes)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid audit changes: {e}")))?;

        Ok(Self {
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            action: row.action,
            changes,
            actor_user_id: row.actor_user_id.map(UserId::new),
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for audit log operations.
pub struct AuditRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuditRepository<'a> {
    /// Create a new audit repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Most recent audit entries for one entity, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if a stored diff cannot be
    /// decoded. Returns `RepositoryError::Database` if the query fails.
    pub async fn recent_for(
        &self,
        entity_type: &str,
        entity_id: i64,
        limit: i64,
    ) -> Result<Vec<AuditEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            "SELECT entity_type, entity_id, action, changes, actor_user_id, created_at \
             FROM audit_log WHERE entity_type = ?1 AND entity_id = ?2 \
             ORDER BY created_at DESC, id DESC LIMIT ?3",
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    // =========================================================================
    // Transaction-scoped operations
    // =========================================================================

    /// Record an audit entry within a caller-provided transaction. Empty
    /// diffs are stored too; they still record that the action happened.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record(
        conn: &mut SqliteConnection,
        entity_type: &str,
        entity_id: i64,
        action: &str,
        changes: &AuditDiff,
        actor_user_id: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let changes = serde_json::to_value(changes)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid audit changes: {e}")))?;

        sqlx::query(
            "INSERT INTO audit_log (entity_type, entity_id, action, changes, actor_user_id, \
                                    created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(action)
        .bind(changes)
        .bind(actor_user_id.map(|id| id.as_i64()))
        .bind(now)
        .execute(conn)
        .await?;

        Ok(())
    }
}
