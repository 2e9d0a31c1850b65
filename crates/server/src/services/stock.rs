//! Quantity validation, stock reservation, and inventory reconciliation.
//!
//! Reservation and release are transaction-scoped so the order service can
//! make a multi-line order all-or-nothing: any line failing rolls back every
//! decrement made before it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::instrument;

use green_grocer_core::{OrderId, ProductId};

use crate::db::{OrderRepository, ProductRepository, RepositoryError};
use crate::error::DomainError;
use crate::models::product::{CreateBatchInput, Product, ProductBatch};

/// Outcome of one stock reconciliation run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StockSyncReport {
    /// Products with batch-level inventory that were checked.
    pub products_checked: usize,
    /// Products whose aggregate stock was corrected.
    pub corrected: usize,
}

/// Service for stock operations.
pub struct StockService<'a> {
    pool: &'a SqlitePool,
}

impl<'a> StockService<'a> {
    /// Create a new stock service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Check a requested quantity against the product's minimum order
    /// quantity and order increment.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidQuantity` carrying the product's
    /// constraints when the quantity violates either rule.
    pub fn validate_quantity(product: &Product, requested: i64) -> Result<(), DomainError> {
        if requested < product.min_order_qty || requested % product.order_increment != 0 {
            return Err(DomainError::InvalidQuantity {
                product_id: product.id,
                requested,
                min_order_qty: product.min_order_qty,
                order_increment: product.order_increment,
            });
        }
        Ok(())
    }

    /// Reserve stock for one order line within a caller-provided
    /// transaction: validates the quantity, atomically decrements the
    /// product's stock, and records the reservation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidQuantity` if the quantity violates order
    /// constraints. Returns `DomainError::InsufficientStock` with the
    /// currently available quantity if stock does not cover the request.
    pub async fn reserve(
        conn: &mut SqliteConnection,
        order_id: OrderId,
        product: &Product,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        Self::validate_quantity(product, quantity)?;

        let decremented =
            ProductRepository::decrement_stock(&mut *conn, product.id, quantity, now).await?;
        if !decremented {
            // Lost a race or never had enough; report what is available now.
            let available = ProductRepository::find_by_id_tx(&mut *conn, product.id)
                .await?
                .map_or(0, |p| p.stock);
            return Err(DomainError::InsufficientStock {
                product_id: product.id,
                requested: quantity,
                available,
            });
        }

        OrderRepository::insert_reservation(conn, order_id, product.id, quantity, now).await?;
        Ok(())
    }

    /// Release every open reservation for an order and return the stock,
    /// within a caller-provided transaction. Returns the number of
    /// reservations released; zero means the order held none, which makes
    /// repeated releases harmless.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Repository` if a statement fails.
    pub async fn release_for_order(
        conn: &mut SqliteConnection,
        order_id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<usize, DomainError> {
        let released = OrderRepository::release_reservations(&mut *conn, order_id, now).await?;

        for &(product_id, quantity) in &released {
            ProductRepository::increment_stock(&mut *conn, product_id, quantity, now).await?;
        }

        Ok(released.len())
    }

    /// Record a received batch and add its units to the product's sellable
    /// stock, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ProductNotFound` if the product does not exist.
    /// Returns `DomainError::Repository` with a conflict if the batch number
    /// is already recorded for this product.
    #[instrument(skip_all, fields(product_id = %product_id, batch = %input.batch_number))]
    pub async fn receive_batch(
        &self,
        product_id: ProductId,
        input: &CreateBatchInput,
        now: DateTime<Utc>,
    ) -> Result<ProductBatch, DomainError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        ProductRepository::find_by_id_tx(&mut tx, product_id)
            .await?
            .ok_or(DomainError::ProductNotFound { product_id })?;

        let batch = ProductRepository::create_batch(&mut tx, product_id, input, now).await?;
        ProductRepository::increment_stock(&mut tx, product_id, batch.quantity, now).await?;

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(batch)
    }

    /// Reconcile aggregate product stock against batch-level inventory.
    ///
    /// For every product with batches, the expected stock is the non-expired
    /// batch total minus open reservations; the aggregate stock column is
    /// corrected where it drifted.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Repository` if the reconciliation fails.
    #[instrument(skip(self, now))]
    pub async fn sync(&self, now: DateTime<Utc>) -> Result<StockSyncReport, DomainError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let totals = ProductRepository::reconciled_stock_totals(&mut tx).await?;

        let mut report = StockSyncReport {
            products_checked: totals.len(),
            corrected: 0,
        };
        for (product_id, total) in totals {
            if ProductRepository::set_stock(&mut tx, product_id, total, now).await? {
                report.corrected += 1;
            }
        }

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(report)
    }
}
