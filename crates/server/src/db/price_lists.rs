//! Database operations for volume price tiers and customer price lists.
//!
//! Queries here do the cheap filtering (scope match, validity window,
//! minimum quantity) in SQL and leave the precedence ordering to the
//! pricing service, which owns the resolution rules.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use green_grocer_core::{
    BrandId, CategoryId, Money, PriceListId, PriceTierId, ProductId, UserId,
};

use super::RepositoryError;
use crate::models::pricing::{
    CreatePriceListInput, CreatePriceTierInput, CustomerPriceList, PriceTier,
};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for price tier queries.
#[derive(Debug, sqlx::FromRow)]
struct PriceTierRow {
    id: i64,
    product_id: i64,
    min_quantity: i64,
    max_quantity: Option<i64>,
    unit_price: Option<i64>,
    discount_bps: Option<i64>,
    created_at: DateTime<Utc>,
}

impl From<PriceTierRow> for PriceTier {
    fn from(row: PriceTierRow) -> Self {
        Self {
            id: PriceTierId::new(row.id),
            product_id: ProductId::new(row.product_id),
            min_quantity: row.min_quantity,
            max_quantity: row.max_quantity,
            unit_price: row.unit_price.map(Money::from_minor),
            discount_bps: row.discount_bps,
            created_at: row.created_at,
        }
    }
}

/// Internal row type for customer price list queries.
#[derive(Debug, sqlx::FromRow)]
struct PriceListRow {
    id: i64,
    user_id: i64,
    product_id: Option<i64>,
    brand_id: Option<i64>,
    category_id: Option<i64>,
    custom_price: Option<i64>,
    discount_bps: Option<i64>,
    min_quantity: i64,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
    priority: i64,
    created_at: DateTime<Utc>,
}

impl From<PriceListRow> for CustomerPriceList {
    fn from(row: PriceListRow) -> Self {
        Self {
            id: PriceListId::new(row.id),
            user_id: UserId::new(row.user_id),
            product_id: row.product_id.map(ProductId::new),
            brand_id: row.brand_id.map(BrandId::new),
            category_id: row.category_id.map(CategoryId::new),
            custom_price: row.custom_price.map(Money::from_minor),
            discount_bps: row.discount_bps,
            min_quantity: row.min_quantity,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            priority: row.priority,
            created_at: row.created_at,
        }
    }
}

const SELECT_PRICE_LIST: &str =
    "SELECT id, user_id, product_id, brand_id, category_id, custom_price, discount_bps, \
     min_quantity, valid_from, valid_until, priority, created_at FROM customer_price_lists";

// =============================================================================
// Repository
// =============================================================================

/// Repository for pricing database operations.
pub struct PricingRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PricingRepository<'a> {
    /// Create a new pricing repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Volume price tiers
    // =========================================================================

    /// Create a volume price tier for a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails, including
    /// check-constraint violations for malformed tiers.
    pub async fn create_tier(
        &self,
        product_id: ProductId,
        input: &CreatePriceTierInput,
        now: DateTime<Utc>,
    ) -> Result<PriceTier, RepositoryError> {
        let row = sqlx::query_as::<_, PriceTierRow>(
            "INSERT INTO price_tiers (product_id, min_quantity, max_quantity, unit_price, \
                                      discount_bps, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             RETURNING id, product_id, min_quantity, max_quantity, unit_price, discount_bps, \
                       created_at",
        )
        .bind(product_id.as_i64())
        .bind(input.min_quantity)
        .bind(input.max_quantity)
        .bind(input.unit_price.map(|p| p.minor()))
        .bind(input.discount_bps)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Delete a volume price tier.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the tier does not exist.
    pub async fn delete_tier(&self, id: PriceTierId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM price_tiers WHERE id = ?1")
            .bind(id.as_i64())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// List a product's volume tiers ordered by ascending minimum quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn tiers_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<PriceTier>, RepositoryError> {
        let rows = sqlx::query_as::<_, PriceTierRow>(
            "SELECT id, product_id, min_quantity, max_quantity, unit_price, discount_bps, \
             created_at FROM price_tiers WHERE product_id = ?1 ORDER BY min_quantity",
        )
        .bind(product_id.as_i64())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// IDs of every product that has at least one volume tier.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn tiered_product_ids(&self) -> Result<Vec<ProductId>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT DISTINCT product_id FROM price_tiers")
            .fetch_all(self.pool)
            .await?;

        Ok(ids.into_iter().map(ProductId::new).collect())
    }

    // =========================================================================
    // Customer price lists
    // =========================================================================

    /// Create a customer price list entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_entry(
        &self,
        user_id: UserId,
        input: &CreatePriceListInput,
        now: DateTime<Utc>,
    ) -> Result<CustomerPriceList, RepositoryError> {
        let row = sqlx::query_as::<_, PriceListRow>(
            "INSERT INTO customer_price_lists (user_id, product_id, brand_id, category_id, \
                                               custom_price, discount_bps, min_quantity, \
                                               valid_from, valid_until, priority, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
             RETURNING id, user_id, product_id, brand_id, category_id, custom_price, \
                       discount_bps, min_quantity, valid_from, valid_until, priority, created_at",
        )
        .bind(user_id.as_i64())
        .bind(input.product_id.map(|id| id.as_i64()))
        .bind(input.brand_id.map(|id| id.as_i64()))
        .bind(input.category_id.map(|id| id.as_i64()))
        .bind(input.custom_price.map(|p| p.minor()))
        .bind(input.discount_bps)
        .bind(input.min_quantity)
        .bind(input.valid_from)
        .bind(input.valid_until)
        .bind(input.priority)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Delete a customer price list entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the entry does not exist.
    pub async fn delete_entry(&self, id: PriceListId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM customer_price_lists WHERE id = ?1")
            .bind(id.as_i64())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// List every price list entry for a customer, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn entries_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<CustomerPriceList>, RepositoryError> {
        let rows = sqlx::query_as::<_, PriceListRow>(&format!(
            "{SELECT_PRICE_LIST} WHERE user_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(user_id.as_i64())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Fetch price list entries that could apply to one (customer, product,
    /// quantity) lookup: scope matches the product directly, via its brand or
    /// category, or globally, the validity window contains `now`, and the
    /// entry's minimum quantity is met.
    ///
    /// Precedence among the returned entries is decided by the caller.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn matching_entries(
        &self,
        user_id: UserId,
        product_id: ProductId,
        brand_id: Option<BrandId>,
        category_id: Option<CategoryId>,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<CustomerPriceList>, RepositoryError> {
        let rows = sqlx::query_as::<_, PriceListRow>(&format!(
            "{SELECT_PRICE_LIST} \
             WHERE user_id = ?1 \
               AND (product_id = ?2 \
                    OR (?3 IS NOT NULL AND brand_id = ?3) \
                    OR (?4 IS NOT NULL AND category_id = ?4) \
                    OR (product_id IS NULL AND brand_id IS NULL AND category_id IS NULL)) \
               AND min_quantity <= ?5 \
               AND (valid_from IS NULL OR valid_from <= ?6) \
               AND (valid_until IS NULL OR valid_until >= ?6)"
        ))
        .bind(user_id.as_i64())
        .bind(product_id.as_i64())
        .bind(brand_id.map(|id| id.as_i64()))
        .bind(category_id.map(|id| id.as_i64()))
        .bind(quantity)
        .bind(now)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
