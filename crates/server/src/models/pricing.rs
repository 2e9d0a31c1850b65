//! Pricing rule domain models.
//!
//! Two rule kinds feed the resolver: [`PriceTier`] (quantity bands applying
//! to everyone) and [`CustomerPriceList`] (negotiated per-customer overrides).
//! Each rule carries either a fixed unit price or a discount off the base
//! price, never both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use green_grocer_core::{
    BrandId, CategoryId, Money, PriceListId, PriceSource, PriceTierId, ProductId, UserId,
};

/// A quantity-based discount band for one product.
///
/// The band covers `[min_quantity, max_quantity)`; a `None` upper bound is
/// unbounded. Bands for a product must not overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTier {
    /// Unique tier ID.
    pub id: PriceTierId,
    /// Product this tier belongs to.
    pub product_id: ProductId,
    /// Inclusive lower quantity bound.
    pub min_quantity: i64,
    /// Exclusive upper quantity bound; `None` = unbounded.
    pub max_quantity: Option<i64>,
    /// Fixed unit price, when set.
    pub unit_price: Option<Money>,
    /// Discount off the base price in basis points, when set.
    pub discount_bps: Option<i64>,
    /// When the tier was created.
    pub created_at: DateTime<Utc>,
}

impl PriceTier {
    /// Returns `true` if `quantity` falls inside this tier's band.
    #[must_use]
    pub fn applies_to(&self, quantity: i64) -> bool {
        quantity >= self.min_quantity && self.max_quantity.is_none_or(|max| quantity < max)
    }

    /// Resolve the unit price this tier yields for the given base price.
    #[must_use]
    pub fn unit_price_for(&self, base_price: Money) -> Money {
        match (self.unit_price, self.discount_bps) {
            (Some(price), _) => price,
            (None, Some(bps)) => base_price.apply_discount_bps(bps),
            // Unreachable for well-formed rows; the schema enforces exactly one
            (None, None) => base_price,
        }
    }
}

/// A negotiated, customer-specific price override.
///
/// Scoped to one product, brand, or category, or global when all three scope
/// fields are `None`. Only applies within the validity window and at or above
/// `min_quantity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerPriceList {
    /// Unique entry ID.
    pub id: PriceListId,
    /// Customer this entry applies to.
    pub user_id: UserId,
    /// Product scope, if any.
    pub product_id: Option<ProductId>,
    /// Brand scope, if any.
    pub brand_id: Option<BrandId>,
    /// Category scope, if any.
    pub category_id: Option<CategoryId>,
    /// Fixed unit price, when set.
    pub custom_price: Option<Money>,
    /// Discount off the base price in basis points, when set.
    pub discount_bps: Option<i64>,
    /// Minimum quantity for the entry to apply.
    pub min_quantity: i64,
    /// Start of the validity window; `None` = unbounded.
    pub valid_from: Option<DateTime<Utc>>,
    /// End of the validity window; `None` = unbounded.
    pub valid_until: Option<DateTime<Utc>>,
    /// Higher priority wins when multiple entries match.
    pub priority: i64,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

impl CustomerPriceList {
    /// Returns `true` if `now` falls inside the validity window.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_from.is_none_or(|from| from <= now)
            && self.valid_until.is_none_or(|until| now <= until)
    }

    /// Scope specificity for tie-breaking: product > brand > category > global.
    #[must_use]
    pub const fn specificity(&self) -> u8 {
        if self.product_id.is_some() {
            3
        } else if self.brand_id.is_some() {
            2
        } else if self.category_id.is_some() {
            1
        } else {
            0
        }
    }

    /// Resolve the unit price this entry yields for the given base price.
    #[must_use]
    pub fn unit_price_for(&self, base_price: Money) -> Money {
        match (self.custom_price, self.discount_bps) {
            (Some(price), _) => price,
            (None, Some(bps)) => base_price.apply_discount_bps(bps),
            (None, None) => base_price,
        }
    }
}

/// The outcome of price resolution for one (customer, product, quantity).
///
/// `unit_price` excludes the loyalty discount; `loyalty_discount_bps` carries
/// it separately because it applies at order level, and only when `source` is
/// not [`PriceSource::PriceList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedPrice {
    /// Resolved per-unit price.
    pub unit_price: Money,
    /// Loyalty discount in basis points; 0 when customer pricing applied.
    pub loyalty_discount_bps: i64,
    /// Which rule kind produced the price.
    pub source: PriceSource,
}

/// Input for creating a price tier.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePriceTierInput {
    /// Inclusive lower quantity bound.
    pub min_quantity: i64,
    /// Exclusive upper quantity bound.
    pub max_quantity: Option<i64>,
    /// Fixed unit price.
    pub unit_price: Option<Money>,
    /// Discount off the base price in basis points.
    pub discount_bps: Option<i64>,
}

/// Input for creating a customer price list entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePriceListInput {
    /// Customer the entry applies to.
    pub user_id: UserId,
    /// Product scope.
    pub product_id: Option<ProductId>,
    /// Brand scope.
    pub brand_id: Option<BrandId>,
    /// Category scope.
    pub category_id: Option<CategoryId>,
    /// Fixed unit price.
    pub custom_price: Option<Money>,
    /// Discount off the base price in basis points.
    pub discount_bps: Option<i64>,
    /// Minimum quantity for the entry to apply.
    #[serde(default = "default_min_quantity")]
    pub min_quantity: i64,
    /// Start of the validity window.
    pub valid_from: Option<DateTime<Utc>>,
    /// End of the validity window.
    pub valid_until: Option<DateTime<Utc>>,
    /// Priority among matching entries.
    #[serde(default)]
    pub priority: i64,
}

fn default_min_quantity() -> i64 {
    1
}
