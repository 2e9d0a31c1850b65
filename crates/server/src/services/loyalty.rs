//! Point accrual and loyalty tier re-evaluation.
//!
//! Both operations run inside the payment-confirmation transaction, so a
//! failed confirmation leaves points and tier untouched. Accrual is
//! idempotent through the point award ledger: one award row per order,
//! enforced by the database, regardless of how often confirmation retries.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::instrument;

use green_grocer_core::{LoyaltyTierId, Money, UserId};

use crate::db::{LoyaltyRepository, OrderRepository, RepositoryError, UserRepository};
use crate::error::DomainError;
use crate::models::loyalty::LoyaltyTier;
use crate::models::order::Order;

/// Result of re-evaluating a customer's loyalty tier.
#[derive(Debug, Clone)]
pub struct TierEvaluation {
    /// Lifetime eligible spend the evaluation was based on.
    pub total_spend: Money,
    /// Tier before the evaluation.
    pub previous_tier_id: Option<LoyaltyTierId>,
    /// Tier after the evaluation, with its full row for notifications.
    pub current_tier: Option<LoyaltyTier>,
}

impl TierEvaluation {
    /// ID of the tier after evaluation.
    #[must_use]
    pub fn current_tier_id(&self) -> Option<LoyaltyTierId> {
        self.current_tier.as_ref().map(|tier| tier.id)
    }

    /// Whether the evaluation moved the customer to a different tier.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.previous_tier_id != self.current_tier_id()
    }
}

/// Loyalty engine operations. All are transaction-scoped; the order service
/// owns the surrounding transaction.
pub struct LoyaltyService;

impl LoyaltyService {
    /// Accrue points for an order that reached paid status. Returns the
    /// points added, which is zero when the order was already awarded or
    /// the customer has no tier.
    ///
    /// The eligible amount excludes shipping; the multiplier is the
    /// customer's tier at confirmation time, before any upgrade this same
    /// payment may cause.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Repository` if a statement fails or the
    /// order's user is missing.
    #[instrument(skip_all, fields(order_id = %order.id, user_id = %order.user_id))]
    pub async fn accrue(
        conn: &mut SqliteConnection,
        order: &Order,
        now: DateTime<Utc>,
    ) -> Result<i64, DomainError> {
        let user = UserRepository::find_by_id_tx(&mut *conn, order.user_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let tier = match user.loyalty_tier_id {
            Some(tier_id) => LoyaltyRepository::find_by_id_tx(&mut *conn, tier_id).await?,
            None => None,
        };
        let points = tier.map_or(0, |tier| tier.points_for(order.eligible_amount()));

        let awarded =
            OrderRepository::insert_point_award(&mut *conn, order.id, order.user_id, points, now)
                .await?;
        if !awarded {
            return Ok(0);
        }

        if points > 0 {
            UserRepository::add_points(&mut *conn, order.user_id, points, now).await?;
        }
        Ok(points)
    }

    /// Recompute a customer's lifetime eligible spend and move them to the
    /// highest tier whose threshold the spend meets. The caller queues the
    /// tier-upgrade notification when the returned evaluation changed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Repository` if a statement fails or the user
    /// is missing.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn reevaluate_tier(
        conn: &mut SqliteConnection,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<TierEvaluation, DomainError> {
        let user = UserRepository::find_by_id_tx(&mut *conn, user_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let total_spend = OrderRepository::eligible_paid_spend(&mut *conn, user_id).await?;
        let tiers = LoyaltyRepository::list_tiers_tx(&mut *conn).await?;
        let current_tier = qualifying_tier(&tiers, total_spend).cloned();

        UserRepository::update_loyalty(
            &mut *conn,
            user_id,
            total_spend,
            current_tier.as_ref().map(|tier| tier.id),
            now,
        )
        .await?;

        Ok(TierEvaluation {
            total_spend,
            previous_tier_id: user.loyalty_tier_id,
            current_tier,
        })
    }
}

/// The highest tier whose spend threshold is met, if any.
fn qualifying_tier(tiers: &[LoyaltyTier], spend: Money) -> Option<&LoyaltyTier> {
    tiers
        .iter()
        .filter(|tier| tier.min_spend <= spend)
        .max_by_key(|tier| tier.min_spend)
}
