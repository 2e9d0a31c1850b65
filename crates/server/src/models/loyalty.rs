//! Loyalty tier domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use green_grocer_core::{LoyaltyTierId, Money};

/// A spend-based customer classification granting discount and point benefits.
///
/// Tiers are ordered by `min_spend` ascending; a user's tier is the highest
/// tier whose threshold their lifetime eligible spend meets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltyTier {
    /// Unique tier ID.
    pub id: LoyaltyTierId,
    /// Display name (e.g. "Silver").
    pub name: String,
    /// Spend threshold to qualify.
    pub min_spend: Money,
    /// Order-level discount in basis points.
    pub discount_bps: i64,
    /// Point accrual rate in basis points: points = floor(eligible * rate).
    /// 10 bps earns one point per 1000 minor units of eligible spend.
    pub point_multiplier_bps: i64,
    /// Whether shipping is free for this tier.
    pub free_shipping: bool,
    /// When the tier was created.
    pub created_at: DateTime<Utc>,
}

impl LoyaltyTier {
    /// Points awarded for an eligible amount: `floor(eligible * multiplier)`.
    #[must_use]
    pub fn points_for(&self, eligible: Money) -> i64 {
        eligible.scale_bps_floor(self.point_multiplier_bps)
    }
}

/// Input for creating a loyalty tier.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLoyaltyTierInput {
    /// Display name.
    pub name: String,
    /// Spend threshold to qualify.
    pub min_spend: Money,
    /// Order-level discount in basis points.
    #[serde(default)]
    pub discount_bps: i64,
    /// Point accrual rate in basis points.
    #[serde(default = "default_multiplier")]
    pub point_multiplier_bps: i64,
    /// Whether shipping is free.
    #[serde(default)]
    pub free_shipping: bool,
}

const fn default_multiplier() -> i64 {
    10
}
