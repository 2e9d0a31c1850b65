//! Database operations for loyalty tiers.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use green_grocer_core::{LoyaltyTierId, Money};

use super::RepositoryError;
use crate::models::loyalty::{CreateLoyaltyTierInput, LoyaltyTier};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for loyalty tier queries.
#[derive(Debug, sqlx::FromRow)]
struct LoyaltyTierRow {
    id: i64,
    name: String,
    min_spend: i64,
    discount_bps: i64,
    point_multiplier_bps: i64,
    free_shipping: bool,
    created_at: DateTime<Utc>,
}

impl From<LoyaltyTierRow> for LoyaltyTier {
    fn from(row: LoyaltyTierRow) -> Self {
        Self {
            id: LoyaltyTierId::new(row.id),
            name: row.name,
            min_spend: Money::from_minor(row.min_spend),
            discount_bps: row.discount_bps,
            point_multiplier_bps: row.point_multiplier_bps,
            free_shipping: row.free_shipping,
            created_at: row.created_at,
        }
    }
}

const SELECT_TIER: &str = "SELECT id, name, min_spend, discount_bps, point_multiplier_bps, \
                           free_shipping, created_at FROM loyalty_tiers";

// =============================================================================
// Repository
// =============================================================================

/// Repository for loyalty tier database operations.
pub struct LoyaltyRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LoyaltyRepository<'a> {
    /// Create a new loyalty repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a loyalty tier.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the tier name already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_tier(
        &self,
        input: &CreateLoyaltyTierInput,
        now: DateTime<Utc>,
    ) -> Result<LoyaltyTier, RepositoryError> {
        let row = sqlx::query_as::<_, LoyaltyTierRow>(
            "INSERT INTO loyalty_tiers (name, min_spend, discount_bps, point_multiplier_bps, \
                                        free_shipping, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             RETURNING id, name, min_spend, discount_bps, point_multiplier_bps, free_shipping, \
                       created_at",
        )
        .bind(&input.name)
        .bind(input.min_spend.minor())
        .bind(input.discount_bps)
        .bind(input.point_multiplier_bps)
        .bind(input.free_shipping)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("tier name already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(row.into())
    }

    /// Get a loyalty tier by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_id(
        &self,
        id: LoyaltyTierId,
    ) -> Result<Option<LoyaltyTier>, RepositoryError> {
        let row = sqlx::query_as::<_, LoyaltyTierRow>(&format!("{SELECT_TIER} WHERE id = ?1"))
            .bind(id.as_i64())
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// List all tiers ordered by ascending spend threshold.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_tiers(&self) -> Result<Vec<LoyaltyTier>, RepositoryError> {
        let rows =
            sqlx::query_as::<_, LoyaltyTierRow>(&format!("{SELECT_TIER} ORDER BY min_spend"))
                .fetch_all(self.pool)
                .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Transaction-scoped operations
    // =========================================================================

    /// Get a loyalty tier by ID within a caller-provided transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_id_tx(
        conn: &mut SqliteConnection,
        id: LoyaltyTierId,
    ) -> Result<Option<LoyaltyTier>, RepositoryError> {
        let row = sqlx::query_as::<_, LoyaltyTierRow>(&format!("{SELECT_TIER} WHERE id = ?1"))
            .bind(id.as_i64())
            .fetch_optional(conn)
            .await?;

        Ok(row.map(Into::into))
    }

    /// List all tiers within a caller-provided transaction, ascending spend
    /// threshold. Used when re-evaluating a customer's tier after payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_tiers_tx(
        conn: &mut SqliteConnection,
    ) -> Result<Vec<LoyaltyTier>, RepositoryError> {
        let rows =
            sqlx::query_as::<_, LoyaltyTierRow>(&format!("{SELECT_TIER} ORDER BY min_spend"))
                .fetch_all(conn)
                .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
