//! Database operations for the product catalog.
//!
//! Covers products, brands, categories, batch-level inventory, and the
//! aggregate stock column. Stock mutations that participate in order flows
//! are transaction-scoped and use conditional updates so stock can never go
//! negative under concurrent checkouts.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use green_grocer_core::{BatchId, BrandId, CategoryId, Money, ProductId};

use super::RepositoryError;
use crate::models::product::{
    Brand, Category, CreateBatchInput, CreateProductInput, Product, ProductBatch,
    UpdateProductInput,
};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    sku: String,
    slug: String,
    name: String,
    base_price: i64,
    stock: i64,
    min_order_qty: i64,
    order_increment: i64,
    is_active: bool,
    is_featured: bool,
    brand_id: Option<i64>,
    category_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            sku: row.sku,
            slug: row.slug,
            name: row.name,
            base_price: Money::from_minor(row.base_price),
            stock: row.stock,
            min_order_qty: row.min_order_qty,
            order_increment: row.order_increment,
            is_active: row.is_active,
            is_featured: row.is_featured,
            brand_id: row.brand_id.map(BrandId::new),
            category_id: row.category_id.map(CategoryId::new),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Internal row type for brand and category queries.
#[derive(Debug, sqlx::FromRow)]
struct TaxonRow {
    id: i64,
    name: String,
    slug: String,
    created_at: DateTime<Utc>,
}

impl From<TaxonRow> for Brand {
    fn from(row: TaxonRow) -> Self {
        Self {
            id: BrandId::new(row.id),
            name: row.name,
            slug: row.slug,
            created_at: row.created_at,
        }
    }
}

impl From<TaxonRow> for Category {
    fn from(row: TaxonRow) -> Self {
        Self {
            id: CategoryId::new(row.id),
            name: row.name,
            slug: row.slug,
            created_at: row.created_at,
        }
    }
}

/// Internal row type for product batch queries.
#[derive(Debug, sqlx::FromRow)]
struct BatchRow {
    id: i64,
    product_id: i64,
    batch_number: String,
    quantity: i64,
    expires_at: Option<DateTime<Utc>>,
    expired: bool,
    created_at: DateTime<Utc>,
}

impl From<BatchRow> for ProductBatch {
    fn from(row: BatchRow) -> Self {
        Self {
            id: BatchId::new(row.id),
            product_id: ProductId::new(row.product_id),
            batch_number: row.batch_number,
            quantity: row.quantity,
            expires_at: row.expires_at,
            expired: row.expired,
            created_at: row.created_at,
        }
    }
}

const SELECT_PRODUCT: &str =
    "SELECT id, sku, slug, name, base_price, stock, min_order_qty, order_increment, \
     is_active, is_featured, brand_id, category_id, created_at, updated_at FROM products";

const SELECT_BATCH: &str = "SELECT id, product_id, batch_number, quantity, expires_at, expired, \
                            created_at FROM product_batches";

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog database operations.
pub struct ProductRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Product CRUD
    // =========================================================================

    /// Create a new product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU or slug already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        input: &CreateProductInput,
        now: DateTime<Utc>,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            "INSERT INTO products (sku, slug, name, base_price, stock, min_order_qty, \
                                   order_increment, is_active, is_featured, brand_id, \
                                   category_id, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12) \
             RETURNING id, sku, slug, name, base_price, stock, min_order_qty, order_increment, \
                       is_active, is_featured, brand_id, category_id, created_at, updated_at",
        )
        .bind(&input.sku)
        .bind(&input.slug)
        .bind(&input.name)
        .bind(input.base_price.minor())
        .bind(input.stock)
        .bind(input.min_order_qty)
        .bind(input.order_increment)
        .bind(input.is_active)
        .bind(input.is_featured)
        .bind(input.brand_id.map(|id| id.as_i64()))
        .bind(input.category_id.map(|id| id.as_i64()))
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("SKU or slug already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(row.into())
    }

    /// Update a product. `None` fields are left unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update(
        &self,
        id: ProductId,
        input: &UpdateProductInput,
        now: DateTime<Utc>,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            "UPDATE products SET \
                 name = COALESCE(?1, name), \
                 base_price = COALESCE(?2, base_price), \
                 min_order_qty = COALESCE(?3, min_order_qty), \
                 order_increment = COALESCE(?4, order_increment), \
                 is_active = COALESCE(?5, is_active), \
                 is_featured = COALESCE(?6, is_featured), \
                 updated_at = ?7 \
             WHERE id = ?8 \
             RETURNING id, sku, slug, name, base_price, stock, min_order_qty, order_increment, \
                       is_active, is_featured, brand_id, category_id, created_at, updated_at",
        )
        .bind(input.name.as_deref())
        .bind(input.base_price.map(|p| p.minor()))
        .bind(input.min_order_qty)
        .bind(input.order_increment)
        .bind(input.is_active)
        .bind(input.is_featured)
        .bind(now)
        .bind(id.as_i64())
        .fetch_optional(self.pool)
        .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id.as_i64())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
            .bind(id.as_i64())
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Get a product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("{SELECT_PRODUCT} WHERE slug = ?1"))
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// List active products, name order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "{SELECT_PRODUCT} WHERE is_active = 1 ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List all products including inactive ones, name order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows =
            sqlx::query_as::<_, ProductRow>(&format!("{SELECT_PRODUCT} ORDER BY name"))
                .fetch_all(self.pool)
                .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Brands and Categories
    // =========================================================================

    /// Create a brand.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug already exists.
    pub async fn create_brand(
        &self,
        name: &str,
        slug: &str,
        now: DateTime<Utc>,
    ) -> Result<Brand, RepositoryError> {
        let row = sqlx::query_as::<_, TaxonRow>(
            "INSERT INTO brands (name, slug, created_at) VALUES (?1, ?2, ?3) \
             RETURNING id, name, slug, created_at",
        )
        .bind(name)
        .bind(slug)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("brand slug already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(row.into())
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug already exists.
    pub async fn create_category(
        &self,
        name: &str,
        slug: &str,
        now: DateTime<Utc>,
    ) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, TaxonRow>(
            "INSERT INTO categories (name, slug, created_at) VALUES (?1, ?2, ?3) \
             RETURNING id, name, slug, created_at",
        )
        .bind(name)
        .bind(slug)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("category slug already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(row.into())
    }

    /// List all brands, name order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_brands(&self) -> Result<Vec<Brand>, RepositoryError> {
        let rows = sqlx::query_as::<_, TaxonRow>(
            "SELECT id, name, slug, created_at FROM brands ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List all categories, name order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, TaxonRow>(
            "SELECT id, name, slug, created_at FROM categories ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Batches
    // =========================================================================

    /// Record a new product batch within a caller-provided transaction, so
    /// the matching stock adjustment commits with it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the batch number already exists
    /// for this product.
    pub async fn create_batch(
        conn: &mut SqliteConnection,
        product_id: ProductId,
        input: &CreateBatchInput,
        now: DateTime<Utc>,
    ) -> Result<ProductBatch, RepositoryError> {
        let row = sqlx::query_as::<_, BatchRow>(
            "INSERT INTO product_batches (product_id, batch_number, quantity, expires_at, \
                                          created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             RETURNING id, product_id, batch_number, quantity, expires_at, expired, created_at",
        )
        .bind(product_id.as_i64())
        .bind(&input.batch_number)
        .bind(input.quantity)
        .bind(input.expires_at)
        .bind(now)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("batch number already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(row.into())
    }

    /// List batches for a product, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn batches_for(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ProductBatch>, RepositoryError> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            "{SELECT_BATCH} WHERE product_id = ?1 ORDER BY created_at"
        ))
        .bind(product_id.as_i64())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Mark batches whose expiry date has passed. Returns the number of
    /// batches newly marked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_expired_batches(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE product_batches SET expired = 1 \
             WHERE expired = 0 AND expires_at IS NOT NULL AND expires_at <= ?1",
        )
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Transaction-scoped stock operations
    // =========================================================================

    /// Expected available stock per product, for every product that has at
    /// least one batch: non-expired batch quantities minus open
    /// reservations, floored at zero. Products without batches are not
    /// listed and keep their manually managed stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reconciled_stock_totals(
        conn: &mut SqliteConnection,
    ) -> Result<Vec<(ProductId, i64)>, RepositoryError> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            "SELECT b.product_id, \
                    MAX(0, COALESCE(SUM(CASE WHEN b.expired = 0 THEN b.quantity ELSE 0 END), 0) \
                           - COALESCE((SELECT SUM(r.quantity) FROM stock_reservations r \
                                       WHERE r.product_id = b.product_id \
                                         AND r.released_at IS NULL), 0)) \
             FROM product_batches b GROUP BY b.product_id",
        )
        .fetch_all(conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, total)| (ProductId::new(id), total))
            .collect())
    }

    /// Get a product by ID within a caller-provided transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_id_tx(
        conn: &mut SqliteConnection,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
            .bind(id.as_i64())
            .fetch_optional(conn)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Atomically decrement stock if enough is available.
    ///
    /// Returns `false` when the conditional update matched no row, i.e. the
    /// product is missing or its stock is below `quantity`. The caller
    /// distinguishes the two by re-reading the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn decrement_stock(
        conn: &mut SqliteConnection,
        id: ProductId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock - ?1, updated_at = ?3 \
             WHERE id = ?2 AND stock >= ?1",
        )
        .bind(quantity)
        .bind(id.as_i64())
        .bind(now)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Return previously reserved stock to a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn increment_stock(
        conn: &mut SqliteConnection,
        id: ProductId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock + ?1, updated_at = ?3 WHERE id = ?2",
        )
        .bind(quantity)
        .bind(id.as_i64())
        .bind(now)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Set a product's aggregate stock to a reconciled value. Returns `true`
    /// if the stored value actually changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_stock(
        conn: &mut SqliteConnection,
        id: ProductId,
        stock: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET stock = ?1, updated_at = ?3 WHERE id = ?2 AND stock != ?1",
        )
        .bind(stock)
        .bind(id.as_i64())
        .bind(now)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
