//! Database operations for orders, order items, stock reservations, and
//! point awards.
//!
//! Order placement and payment confirmation touch several tables that must
//! move together, so most writes here are transaction-scoped associated
//! functions. The order service owns the transaction and composes these
//! into atomic flows; nothing in this module commits.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use green_grocer_core::{
    Money, OrderId, OrderItemId, OrderStatus, PaymentStatus, PriceSource, ProductId,
    ReservationId, UserId,
};

use super::RepositoryError;
use crate::models::order::{Order, OrderItem, PointAward, StockReservation};

// =============================================================================
// Insert Parameter Types
// =============================================================================

/// Parameters for inserting a new order header.
#[derive(Debug)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: UserId,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub shipping_cost: Money,
    pub total_amount: Money,
}

/// Parameters for inserting one order line.
///
/// SKU, name, and unit price are copied from the product at placement time
/// so the line survives later catalog edits.
#[derive(Debug)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
    pub price_source: PriceSource,
}

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    order_number: String,
    user_id: i64,
    status: OrderStatus,
    payment_status: PaymentStatus,
    subtotal: i64,
    discount_amount: i64,
    shipping_cost: i64,
    total_amount: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            order_number: row.order_number,
            user_id: UserId::new(row.user_id),
            status: row.status,
            payment_status: row.payment_status,
            subtotal: Money::from_minor(row.subtotal),
            discount_amount: Money::from_minor(row.discount_amount),
            shipping_cost: Money::from_minor(row.shipping_cost),
            total_amount: Money::from_minor(row.total_amount),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Internal row type for order item queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i64,
    order_id: i64,
    product_id: i64,
    sku: String,
    name: String,
    quantity: i64,
    unit_price: i64,
    line_total: i64,
    price_source: PriceSource,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: ProductId::new(row.product_id),
            sku: row.sku,
            name: row.name,
            quantity: row.quantity,
            unit_price: Money::from_minor(row.unit_price),
            line_total: Money::from_minor(row.line_total),
            price_source: row.price_source,
        }
    }
}

/// Internal row type for stock reservation queries.
#[derive(Debug, sqlx::FromRow)]
struct ReservationRow {
    id: i64,
    order_id: i64,
    product_id: i64,
    quantity: i64,
    created_at: DateTime<Utc>,
    released_at: Option<DateTime<Utc>>,
}

impl From<ReservationRow> for StockReservation {
    fn from(row: ReservationRow) -> Self {
        Self {
            id: ReservationId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: ProductId::new(row.product_id),
            quantity: row.quantity,
            created_at: row.created_at,
            released_at: row.released_at,
        }
    }
}

const SELECT_ORDER: &str =
    "SELECT id, order_number, user_id, status, payment_status, subtotal, discount_amount, \
     shipping_cost, total_amount, created_at, updated_at FROM orders";

const RETURNING_ORDER: &str =
    "RETURNING id, order_number, user_id, status, payment_status, subtotal, discount_amount, \
     shipping_cost, total_amount, created_at, updated_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE id = ?1"))
            .bind(id.as_i64())
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// List a customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{SELECT_ORDER} WHERE user_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(user_id.as_i64())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List all orders, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, RepositoryError> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    "{SELECT_ORDER} WHERE status = ?1 ORDER BY created_at DESC"
                ))
                .bind(status)
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} ORDER BY created_at DESC"))
                    .fetch_all(self.pool)
                    .await?
            }
        };

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Items belonging to an order, insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items_for(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, product_id, sku, name, quantity, unit_price, line_total, \
             price_source FROM order_items WHERE order_id = ?1 ORDER BY id",
        )
        .bind(order_id.as_i64())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Stock reservations recorded for an order, including released ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reservations_for(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<StockReservation>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            "SELECT id, order_id, product_id, quantity, created_at, released_at \
             FROM stock_reservations WHERE order_id = ?1 ORDER BY id",
        )
        .bind(order_id.as_i64())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Orders still pending with pending payment, created at or before
    /// `cutoff`, oldest first. These are candidates for orphan cleanup.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_orphaned(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{SELECT_ORDER} WHERE status = 'pending' AND payment_status = 'pending' \
             AND created_at <= ?1 ORDER BY created_at"
        ))
        .bind(cutoff)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Point award recorded for an order, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn point_award_for(
        &self,
        order_id: OrderId,
    ) -> Result<Option<PointAward>, RepositoryError> {
        let row = sqlx::query_as::<_, (i64, i64, i64, DateTime<Utc>)>(
            "SELECT order_id, user_id, points, awarded_at FROM point_awards WHERE order_id = ?1",
        )
        .bind(order_id.as_i64())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(order_id, user_id, points, awarded_at)| PointAward {
            order_id: OrderId::new(order_id),
            user_id: UserId::new(user_id),
            points,
            awarded_at,
        }))
    }

    // =========================================================================
    // Transaction-scoped operations
    // =========================================================================

    /// Insert an order header within a caller-provided transaction. Status
    /// and payment status start at their pending defaults.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order number already
    /// exists. Returns `RepositoryError::Database` for other failures.
    pub async fn insert_order(
        conn: &mut SqliteConnection,
        new: &NewOrder,
        now: DateTime<Utc>,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders (order_number, user_id, subtotal, discount_amount, \
                                 shipping_cost, total_amount, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7) {RETURNING_ORDER}"
        ))
        .bind(&new.order_number)
        .bind(new.user_id.as_i64())
        .bind(new.subtotal.minor())
        .bind(new.discount_amount.minor())
        .bind(new.shipping_cost.minor())
        .bind(new.total_amount.minor())
        .bind(now)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("order number already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(row.into())
    }

    /// Insert one order line within a caller-provided transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_item(
        conn: &mut SqliteConnection,
        order_id: OrderId,
        item: &NewOrderItem,
    ) -> Result<OrderItem, RepositoryError> {
        let row = sqlx::query_as::<_, OrderItemRow>(
            "INSERT INTO order_items (order_id, product_id, sku, name, quantity, unit_price, \
                                      line_total, price_source) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             RETURNING id, order_id, product_id, sku, name, quantity, unit_price, line_total, \
                       price_source",
        )
        .bind(order_id.as_i64())
        .bind(item.product_id.as_i64())
        .bind(&item.sku)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.unit_price.minor())
        .bind(item.line_total.minor())
        .bind(item.price_source)
        .fetch_one(conn)
        .await?;

        Ok(row.into())
    }

    /// Record a stock reservation within a caller-provided transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_reservation(
        conn: &mut SqliteConnection,
        order_id: OrderId,
        product_id: ProductId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO stock_reservations (order_id, product_id, quantity, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(order_id.as_i64())
        .bind(product_id.as_i64())
        .bind(quantity)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Release every open reservation for an order, returning the product
    /// and quantity of each reservation released. Already-released rows are
    /// untouched, so calling this twice returns nothing the second time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn release_reservations(
        conn: &mut SqliteConnection,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<Vec<(ProductId, i64)>, RepositoryError> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            "UPDATE stock_reservations SET released_at = ?2 \
             WHERE order_id = ?1 AND released_at IS NULL \
             RETURNING product_id, quantity",
        )
        .bind(order_id.as_i64())
        .bind(now)
        .fetch_all(conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, quantity)| (ProductId::new(id), quantity))
            .collect())
    }

    /// Get an order by ID within a caller-provided transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_id_tx(
        conn: &mut SqliteConnection,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE id = ?1"))
            .bind(id.as_i64())
            .fetch_optional(conn)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Update an order's status columns within a caller-provided
    /// transaction. Transition legality is the service's concern.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn update_status(
        conn: &mut SqliteConnection,
        id: OrderId,
        status: OrderStatus,
        payment_status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET status = ?2, payment_status = ?3, updated_at = ?4 \
             WHERE id = ?1 {RETURNING_ORDER}"
        ))
        .bind(id.as_i64())
        .bind(status)
        .bind(payment_status)
        .bind(now)
        .fetch_optional(conn)
        .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Sum of `subtotal - discount_amount` across a customer's paid orders,
    /// the figure loyalty tiers are evaluated against.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn eligible_paid_spend(
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> Result<Money, RepositoryError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(subtotal - discount_amount), 0) FROM orders \
             WHERE user_id = ?1 AND payment_status = 'paid'",
        )
        .bind(user_id.as_i64())
        .fetch_one(conn)
        .await?;

        Ok(Money::from_minor(total))
    }

    /// Record a point award for an order. Returns `false` if the order was
    /// already awarded; the UNIQUE constraint on `order_id` makes retried
    /// payment confirmations award at most once.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_point_award(
        conn: &mut SqliteConnection,
        order_id: OrderId,
        user_id: UserId,
        points: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO point_awards (order_id, user_id, points, awarded_at) \
             VALUES (?1, ?2, ?3, ?4) ON CONFLICT (order_id) DO NOTHING",
        )
        .bind(order_id.as_i64())
        .bind(user_id.as_i64())
        .bind(points)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
