//! User domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use green_grocer_core::{LoyaltyTierId, Money, Phone, UserId, UserRole};

/// A wholesale customer or back-office user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name (business or contact name).
    pub name: String,
    /// Phone number; doubles as the WhatsApp delivery address.
    pub phone: Phone,
    /// Permission role.
    pub role: UserRole,
    /// Accrued loyalty points.
    pub points: i64,
    /// Lifetime eligible spend across paid orders.
    pub total_spend: Money,
    /// Current loyalty tier, recomputed after each paid order.
    pub loyalty_tier_id: Option<LoyaltyTierId>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new user.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    /// Display name.
    pub name: String,
    /// Phone number.
    pub phone: Phone,
    /// Permission role.
    pub role: UserRole,
}
