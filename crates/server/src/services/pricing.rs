//! Effective unit price resolution.
//!
//! Every price shown to or charged from a customer goes through
//! [`PricingService::resolve`]. Resolution order:
//!
//! 1. Customer price list entries whose scope covers the product, filtered
//!    by validity window and minimum quantity. The winner is the highest
//!    priority, then the most specific scope (product > brand > category >
//!    global), then the newest entry. Price list prices are final; no
//!    loyalty discount stacks on top.
//! 2. Volume price tiers: the qualifying band with the highest minimum
//!    quantity. The customer's loyalty discount still applies at order level.
//! 3. The product's base price, again with the loyalty discount applicable.
//!
//! The selection functions are pure so the precedence rules are testable
//! without a database.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::instrument;

use green_grocer_core::PriceSource;

use crate::db::{LoyaltyRepository, PricingRepository};
use crate::error::DomainError;
use crate::models::pricing::{CustomerPriceList, PriceTier, ResolvedPrice};
use crate::models::product::Product;
use crate::models::user::User;

/// Service for resolving effective prices.
pub struct PricingService<'a> {
    pricing: PricingRepository<'a>,
    loyalty: LoyaltyRepository<'a>,
}

impl<'a> PricingService<'a> {
    /// Create a new pricing service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self {
            pricing: PricingRepository::new(pool),
            loyalty: LoyaltyRepository::new(pool),
        }
    }

    /// Resolve the effective unit price for one customer, product, and
    /// quantity at `now`.
    ///
    /// The returned unit price never includes the loyalty discount; the
    /// order service applies that once at order level, and only when no
    /// line came from a price list.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ProductNotFound` if the product is inactive.
    /// Returns `DomainError::Repository` if a query fails.
    #[instrument(skip_all, fields(user_id = %user.id, product_id = %product.id, quantity))]
    pub async fn resolve(
        &self,
        user: &User,
        product: &Product,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<ResolvedPrice, DomainError> {
        if !product.is_active {
            return Err(DomainError::ProductNotFound {
                product_id: product.id,
            });
        }

        let entries = self
            .pricing
            .matching_entries(
                user.id,
                product.id,
                product.brand_id,
                product.category_id,
                quantity,
                now,
            )
            .await?;

        if let Some(entry) = best_price_list_entry(&entries, quantity, now) {
            return Ok(ResolvedPrice {
                unit_price: entry.unit_price_for(product.base_price),
                loyalty_discount_bps: 0,
                source: PriceSource::PriceList,
            });
        }

        let loyalty_discount_bps = match user.loyalty_tier_id {
            Some(tier_id) => self
                .loyalty
                .find_by_id(tier_id)
                .await?
                .map_or(0, |tier| tier.discount_bps),
            None => 0,
        };

        let tiers = self.pricing.tiers_for_product(product.id).await?;
        if let Some(tier) = best_volume_tier(&tiers, quantity) {
            return Ok(ResolvedPrice {
                unit_price: tier.unit_price_for(product.base_price),
                loyalty_discount_bps,
                source: PriceSource::Tier,
            });
        }

        Ok(ResolvedPrice {
            unit_price: product.base_price,
            loyalty_discount_bps,
            source: PriceSource::Base,
        })
    }
}

/// Pick the winning price list entry among candidates.
///
/// Entries that fail the validity window or minimum quantity are ignored
/// even if the query already filtered them. Among the rest: highest
/// priority, then most specific scope, then newest.
fn best_price_list_entry(
    entries: &[CustomerPriceList],
    quantity: i64,
    now: DateTime<Utc>,
) -> Option<&CustomerPriceList> {
    entries
        .iter()
        .filter(|e| e.min_quantity <= quantity && e.is_valid_at(now))
        .max_by(|a, b| precedence(a, b))
}

fn precedence(a: &CustomerPriceList, b: &CustomerPriceList) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then(a.specificity().cmp(&b.specificity()))
        .then(a.created_at.cmp(&b.created_at))
}

/// Pick the volume tier band the quantity falls into. Bands are half-open
/// `[min, max)`; when several qualify the highest minimum wins.
fn best_volume_tier(tiers: &[PriceTier], quantity: i64) -> Option<&PriceTier> {
    tiers
        .iter()
        .filter(|t| t.applies_to(quantity))
        .max_by_key(|t| t.min_quantity)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use green_grocer_core::{
        BrandId, CategoryId, Money, PriceListId, PriceTierId, ProductId, UserId,
    };

    use super::*;

    fn entry(id: i64) -> CustomerPriceList {
        CustomerPriceList {
            id: PriceListId::new(id),
            user_id: UserId::new(1),
            product_id: None,
            brand_id: None,
            category_id: None,
            custom_price: Some(Money::from_minor(90_000)),
            discount_bps: None,
            min_quantity: 1,
            valid_from: None,
            valid_until: None,
            priority: 0,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn tier(min: i64, max: Option<i64>) -> PriceTier {
        PriceTier {
            id: PriceTierId::new(min),
            product_id: ProductId::new(1),
            min_quantity: min,
            max_quantity: max,
            unit_price: Some(Money::from_minor(min * 100)),
            discount_bps: None,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_priority_beats_specificity() {
        let mut product_scoped = entry(1);
        product_scoped.product_id = Some(ProductId::new(5));
        product_scoped.priority = 0;

        let mut global_high_priority = entry(2);
        global_high_priority.priority = 10;

        let entries = vec![product_scoped, global_high_priority];
        let winner = best_price_list_entry(&entries, 10, now()).unwrap();
        assert_eq!(winner.id, PriceListId::new(2));
    }

    #[test]
    fn test_specificity_breaks_priority_tie() {
        let mut category_scoped = entry(1);
        category_scoped.category_id = Some(CategoryId::new(3));

        let mut brand_scoped = entry(2);
        brand_scoped.brand_id = Some(BrandId::new(7));

        let mut product_scoped = entry(3);
        product_scoped.product_id = Some(ProductId::new(5));

        let entries = vec![category_scoped, brand_scoped, product_scoped];
        let winner = best_price_list_entry(&entries, 10, now()).unwrap();
        assert_eq!(winner.id, PriceListId::new(3));

        let entries_without_product = vec![entries[0].clone(), entries[1].clone()];
        let winner = best_price_list_entry(&entries_without_product, 10, now()).unwrap();
        assert_eq!(winner.id, PriceListId::new(2));
    }

    #[test]
    fn test_newest_entry_breaks_full_tie() {
        let mut older = entry(1);
        older.created_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        let mut newer = entry(2);
        newer.created_at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

        let entries = vec![older, newer];
        let winner = best_price_list_entry(&entries, 10, now()).unwrap();
        assert_eq!(winner.id, PriceListId::new(2));
    }

    #[test]
    fn test_min_quantity_excludes_entry() {
        let mut bulk_only = entry(1);
        bulk_only.min_quantity = 50;

        let entries = vec![bulk_only];
        assert!(best_price_list_entry(&entries, 49, now()).is_none());
        assert!(best_price_list_entry(&entries, 50, now()).is_some());
    }

    #[test]
    fn test_expired_entry_excluded() {
        let mut expired = entry(1);
        expired.valid_until = Some(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap());

        let mut current = entry(2);
        current.priority = -5;

        let entries = vec![expired, current];
        let winner = best_price_list_entry(&entries, 10, now()).unwrap();
        assert_eq!(winner.id, PriceListId::new(2));
    }

    #[test]
    fn test_no_candidates_yields_none() {
        assert!(best_price_list_entry(&[], 10, now()).is_none());
    }

    #[test]
    fn test_highest_qualifying_band_wins() {
        let tiers = vec![tier(10, Some(50)), tier(50, Some(100)), tier(100, None)];

        assert_eq!(best_volume_tier(&tiers, 5), None);
        assert_eq!(
            best_volume_tier(&tiers, 10).unwrap().min_quantity,
            10
        );
        // Exclusive upper bound: 50 falls into the next band.
        assert_eq!(
            best_volume_tier(&tiers, 50).unwrap().min_quantity,
            50
        );
        assert_eq!(
            best_volume_tier(&tiers, 99).unwrap().min_quantity,
            50
        );
        assert_eq!(
            best_volume_tier(&tiers, 100_000).unwrap().min_quantity,
            100
        );
    }

    #[test]
    fn test_overlapping_bands_prefer_higher_minimum() {
        let tiers = vec![tier(10, None), tier(25, None)];
        assert_eq!(best_volume_tier(&tiers, 30).unwrap().min_quantity, 25);
    }
}
