//! Order lifecycle: creation, payment confirmation, cancellation,
//! completion, and orphan cleanup.
//!
//! Creation runs in two phases. Pricing is resolved read-only first; then a
//! single transaction inserts the order header, reserves stock line by
//! line, and writes the items. Any line failing rolls the whole order back,
//! so partial reservations never survive. Payment confirmation, accrual,
//! and tier re-evaluation share one transaction for the same reason.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::instrument;
use uuid::Uuid;

use green_grocer_core::{
    Money, NotificationKind, OrderId, OrderStatus, PaymentStatus, PriceSource,
};

use crate::db::orders::{NewOrder, NewOrderItem};
use crate::db::{
    AuditRepository, LoyaltyRepository, NotificationRepository, OrderRepository,
    ProductRepository, RepositoryError,
};
use crate::error::DomainError;
use crate::models::audit::AuditDiff;
use crate::models::order::{NewOrderLine, Order, OrderWithItems};
use crate::models::pricing::ResolvedPrice;
use crate::models::product::Product;
use crate::models::user::User;
use crate::services::loyalty::LoyaltyService;
use crate::services::pricing::PricingService;
use crate::services::stock::StockService;

/// Retries for the order-number collision case.
const ORDER_NUMBER_ATTEMPTS: u32 = 3;

/// One line after pricing, ready to persist.
struct PreparedLine {
    product: Product,
    quantity: i64,
    price: ResolvedPrice,
}

/// Computed order-level amounts.
struct OrderTotals {
    subtotal: Money,
    discount_amount: Money,
    shipping_cost: Money,
    total_amount: Money,
}

/// Service for order lifecycle operations.
pub struct OrderService<'a> {
    pool: &'a SqlitePool,
    shipping_flat_rate: Money,
    orders: OrderRepository<'a>,
    products: ProductRepository<'a>,
    loyalty: LoyaltyRepository<'a>,
    pricing: PricingService<'a>,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool, shipping_flat_rate: Money) -> Self {
        Self {
            pool,
            shipping_flat_rate,
            orders: OrderRepository::new(pool),
            products: ProductRepository::new(pool),
            loyalty: LoyaltyRepository::new(pool),
            pricing: PricingService::new(pool),
        }
    }

    /// Place an order for a customer. All lines are priced, reserved, and
    /// persisted atomically; afterwards an order-confirmation notification
    /// is queued, whose failure never affects the already-committed order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ProductNotFound` for missing or inactive
    /// products, `DomainError::InvalidQuantity` for MOQ/increment
    /// violations, and `DomainError::InsufficientStock` when any line
    /// cannot be covered.
    #[instrument(skip_all, fields(user_id = %user.id, lines = lines.len()))]
    pub async fn create(
        &self,
        user: &User,
        lines: &[NewOrderLine],
        now: DateTime<Utc>,
    ) -> Result<OrderWithItems, DomainError> {
        let prepared = self.prepare_lines(user, lines, now).await?;
        let totals = self.compute_totals(user, &prepared).await?;

        let mut attempts = 0;
        loop {
            attempts += 1;
            let order_number = generate_order_number(now);
            match self.persist(user, &prepared, &totals, order_number, now).await {
                Err(DomainError::Repository(RepositoryError::Conflict(_)))
                    if attempts < ORDER_NUMBER_ATTEMPTS => {}
                result => {
                    let created = result?;
                    tracing::info!(
                        order_id = %created.order.id,
                        order_number = %created.order.order_number,
                        total_amount = %created.order.total_amount,
                        "Order placed"
                    );
                    self.queue_confirmation(&created.order, now).await;
                    return Ok(created);
                }
            }
        }
    }

    /// Confirm payment for a pending order: status moves to processing,
    /// payment to paid, points accrue, and the customer's tier is
    /// re-evaluated, all in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidOrderOperation` if the order or its
    /// payment is not in a confirmable state.
    #[instrument(skip_all, fields(order_id = %order_id, actor = %actor.id))]
    pub async fn confirm_payment(
        &self,
        order_id: OrderId,
        actor: &User,
        now: DateTime<Utc>,
    ) -> Result<Order, DomainError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let order = OrderRepository::find_by_id_tx(&mut tx, order_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if order.payment_status != PaymentStatus::Pending {
            return Err(DomainError::InvalidOrderOperation {
                order_id,
                reason: format!("payment is already {}", order.payment_status),
            });
        }
        if !order.status.can_transition_to(OrderStatus::Processing) {
            return Err(DomainError::InvalidOrderOperation {
                order_id,
                reason: format!("cannot confirm payment for a {} order", order.status),
            });
        }

        let updated = OrderRepository::update_status(
            &mut tx,
            order_id,
            OrderStatus::Processing,
            PaymentStatus::Paid,
            now,
        )
        .await?;

        let points = LoyaltyService::accrue(&mut tx, &updated, now).await?;
        let evaluation = LoyaltyService::reevaluate_tier(&mut tx, updated.user_id, now).await?;

        NotificationRepository::queue(
            &mut tx,
            NotificationKind::PaymentReceived,
            updated.user_id,
            Some(order_id),
            &json!({
                "order_number": updated.order_number,
                "total_amount": updated.total_amount,
                "points_awarded": points,
            }),
            now,
        )
        .await?;

        if evaluation.changed()
            && let Some(tier) = &evaluation.current_tier
        {
            NotificationRepository::queue(
                &mut tx,
                NotificationKind::TierUpgrade,
                updated.user_id,
                None,
                &json!({ "tier": tier.name, "total_spend": evaluation.total_spend }),
                now,
            )
            .await?;

            let diff = AuditDiff::new().record(
                "loyalty_tier_id",
                evaluation.previous_tier_id,
                evaluation.current_tier_id(),
            );
            AuditRepository::record(
                &mut tx,
                "user",
                updated.user_id.as_i64(),
                "tier_changed",
                &diff,
                Some(actor.id),
                now,
            )
            .await?;
        }

        let diff = AuditDiff::new()
            .record("status", order.status, updated.status)
            .record("payment_status", order.payment_status, updated.payment_status);
        AuditRepository::record(
            &mut tx,
            "order",
            order_id.as_i64(),
            "confirm_payment",
            &diff,
            Some(actor.id),
            now,
        )
        .await?;

        tx.commit().await.map_err(RepositoryError::from)?;

        tracing::info!(
            order_id = %order_id,
            points,
            tier_changed = evaluation.changed(),
            "Payment confirmed"
        );
        Ok(updated)
    }

    /// Cancel an order and return its reserved stock. Customers may cancel
    /// their own orders while still pending; staff may cancel any
    /// non-terminal order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidOrderOperation` when the order's state
    /// or the actor's role does not permit cancellation.
    #[instrument(skip_all, fields(order_id = %order_id, actor = %actor.id))]
    pub async fn cancel(
        &self,
        order_id: OrderId,
        actor: &User,
        now: DateTime<Utc>,
    ) -> Result<Order, DomainError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let order = OrderRepository::find_by_id_tx(&mut tx, order_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if !actor.role.is_staff() {
            if order.user_id != actor.id {
                return Err(DomainError::Repository(RepositoryError::NotFound));
            }
            if order.status != OrderStatus::Pending {
                return Err(DomainError::InvalidOrderOperation {
                    order_id,
                    reason: format!("customers can only cancel pending orders, not {}", order.status),
                });
            }
        }
        if !order.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(DomainError::InvalidOrderOperation {
                order_id,
                reason: format!("cannot cancel a {} order", order.status),
            });
        }

        let released = StockService::release_for_order(&mut tx, order_id, now).await?;
        let updated = OrderRepository::update_status(
            &mut tx,
            order_id,
            OrderStatus::Cancelled,
            order.payment_status,
            now,
        )
        .await?;

        NotificationRepository::queue(
            &mut tx,
            NotificationKind::OrderCancelled,
            updated.user_id,
            Some(order_id),
            &json!({ "order_number": updated.order_number }),
            now,
        )
        .await?;

        let diff = AuditDiff::new().record("status", order.status, updated.status);
        AuditRepository::record(
            &mut tx,
            "order",
            order_id.as_i64(),
            "cancelled",
            &diff,
            Some(actor.id),
            now,
        )
        .await?;

        tx.commit().await.map_err(RepositoryError::from)?;

        tracing::info!(order_id = %order_id, released, "Order cancelled");
        Ok(updated)
    }

    /// Mark a processing or paid order as completed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidOrderOperation` if the order's status
    /// does not allow completion.
    #[instrument(skip_all, fields(order_id = %order_id, actor = %actor.id))]
    pub async fn complete(
        &self,
        order_id: OrderId,
        actor: &User,
        now: DateTime<Utc>,
    ) -> Result<Order, DomainError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let order = OrderRepository::find_by_id_tx(&mut tx, order_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if !order.status.can_transition_to(OrderStatus::Completed) {
            return Err(DomainError::InvalidOrderOperation {
                order_id,
                reason: format!("cannot complete a {} order", order.status),
            });
        }

        let updated = OrderRepository::update_status(
            &mut tx,
            order_id,
            OrderStatus::Completed,
            order.payment_status,
            now,
        )
        .await?;

        NotificationRepository::queue(
            &mut tx,
            NotificationKind::OrderCompleted,
            updated.user_id,
            Some(order_id),
            &json!({ "order_number": updated.order_number }),
            now,
        )
        .await?;

        let diff = AuditDiff::new().record("status", order.status, updated.status);
        AuditRepository::record(
            &mut tx,
            "order",
            order_id.as_i64(),
            "completed",
            &diff,
            Some(actor.id),
            now,
        )
        .await?;

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(updated)
    }

    /// Cancel orders that sat pending with pending payment for longer than
    /// `older_than_hours`, releasing their stock. Each order is handled in
    /// its own transaction with a status re-check, so runs are idempotent
    /// and an order is cancelled exactly once.
    ///
    /// Returns the number of orders cancelled.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Repository` if a statement fails; already
    /// processed orders stay cancelled.
    #[instrument(skip(self, now))]
    pub async fn cleanup_orphaned(
        &self,
        older_than_hours: i64,
        now: DateTime<Utc>,
    ) -> Result<usize, DomainError> {
        let cutoff = now - Duration::hours(older_than_hours);
        let candidates = self.orders.find_orphaned(cutoff).await?;

        let mut cancelled = 0;
        for candidate in candidates {
            let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

            // Re-check under the transaction; the order may have moved on
            // since the candidate list was built.
            let Some(order) = OrderRepository::find_by_id_tx(&mut tx, candidate.id).await? else {
                continue;
            };
            if order.status != OrderStatus::Pending
                || order.payment_status != PaymentStatus::Pending
            {
                continue;
            }

            StockService::release_for_order(&mut tx, order.id, now).await?;
            let updated = OrderRepository::update_status(
                &mut tx,
                order.id,
                OrderStatus::Cancelled,
                order.payment_status,
                now,
            )
            .await?;

            NotificationRepository::queue(
                &mut tx,
                NotificationKind::OrderCancelled,
                updated.user_id,
                Some(order.id),
                &json!({ "order_number": updated.order_number }),
                now,
            )
            .await?;

            let diff = AuditDiff::new().record("status", order.status, updated.status);
            AuditRepository::record(
                &mut tx,
                "order",
                order.id.as_i64(),
                "orphan_cancelled",
                &diff,
                None,
                now,
            )
            .await?;

            tx.commit().await.map_err(RepositoryError::from)?;
            cancelled += 1;
        }

        if cancelled > 0 {
            tracing::info!(cancelled, older_than_hours, "Orphaned orders cancelled");
        }
        Ok(cancelled)
    }

    // =========================================================================
    // Creation phases
    // =========================================================================

    /// Load, validate, and price every requested line. Read-only.
    async fn prepare_lines(
        &self,
        user: &User,
        lines: &[NewOrderLine],
        now: DateTime<Utc>,
    ) -> Result<Vec<PreparedLine>, DomainError> {
        let mut prepared = Vec::with_capacity(lines.len());
        for line in lines {
            let product = self
                .products
                .find_by_id(line.product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or(DomainError::ProductNotFound {
                    product_id: line.product_id,
                })?;

            StockService::validate_quantity(&product, line.quantity)?;
            let price = self.pricing.resolve(user, &product, line.quantity, now).await?;

            prepared.push(PreparedLine {
                product,
                quantity: line.quantity,
                price,
            });
        }
        Ok(prepared)
    }

    /// Compute order-level amounts from the prepared lines. The loyalty
    /// discount applies only when no line carries a price-list override;
    /// free-shipping tiers zero the flat rate.
    async fn compute_totals(
        &self,
        user: &User,
        prepared: &[PreparedLine],
    ) -> Result<OrderTotals, DomainError> {
        let subtotal = prepared
            .iter()
            .fold(Money::zero(), |acc, line| acc + line.price.unit_price * line.quantity);

        let has_price_list_line = prepared
            .iter()
            .any(|line| line.price.source == PriceSource::PriceList);
        let loyalty_discount_bps = prepared
            .iter()
            .map(|line| line.price.loyalty_discount_bps)
            .max()
            .unwrap_or(0);
        let discount_amount = if has_price_list_line {
            Money::zero()
        } else {
            subtotal.discount_amount(loyalty_discount_bps)
        };

        let tier = match user.loyalty_tier_id {
            Some(tier_id) => self.loyalty.find_by_id(tier_id).await?,
            None => None,
        };
        let shipping_cost = if tier.is_some_and(|t| t.free_shipping) {
            Money::zero()
        } else {
            self.shipping_flat_rate
        };

        let total_amount = subtotal - discount_amount + shipping_cost;
        Ok(OrderTotals {
            subtotal,
            discount_amount,
            shipping_cost,
            total_amount,
        })
    }

    /// Insert the order, reservations, items, and audit entry in one
    /// transaction.
    async fn persist(
        &self,
        user: &User,
        prepared: &[PreparedLine],
        totals: &OrderTotals,
        order_number: String,
        now: DateTime<Utc>,
    ) -> Result<OrderWithItems, DomainError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let order = OrderRepository::insert_order(
            &mut tx,
            &NewOrder {
                order_number,
                user_id: user.id,
                subtotal: totals.subtotal,
                discount_amount: totals.discount_amount,
                shipping_cost: totals.shipping_cost,
                total_amount: totals.total_amount,
            },
            now,
        )
        .await?;

        let mut items = Vec::with_capacity(prepared.len());
        for line in prepared {
            StockService::reserve(&mut tx, order.id, &line.product, line.quantity, now).await?;
            let item = OrderRepository::insert_item(
                &mut tx,
                order.id,
                &NewOrderItem {
                    product_id: line.product.id,
                    sku: line.product.sku.clone(),
                    name: line.product.name.clone(),
                    quantity: line.quantity,
                    unit_price: line.price.unit_price,
                    line_total: line.price.unit_price * line.quantity,
                    price_source: line.price.source,
                },
            )
            .await?;
            items.push(item);
        }

        let diff = AuditDiff::new()
            .record("status", None::<&str>, order.status)
            .record("total_amount", None::<i64>, order.total_amount);
        AuditRepository::record(
            &mut tx,
            "order",
            order.id.as_i64(),
            "created",
            &diff,
            Some(user.id),
            now,
        )
        .await?;

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(OrderWithItems { order, items })
    }

    /// Queue the order-confirmation notification after the order committed.
    /// Failures are logged and swallowed; the order already stands.
    async fn queue_confirmation(&self, order: &Order, now: DateTime<Utc>) {
        let payload = json!({
            "order_number": order.order_number,
            "total_amount": order.total_amount,
            "status": order.status,
        });

        let result: Result<(), RepositoryError> = async {
            let mut conn = self.pool.acquire().await?;
            NotificationRepository::queue(
                &mut conn,
                NotificationKind::OrderConfirmation,
                order.user_id,
                Some(order.id),
                &payload,
                now,
            )
            .await
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, order_id = %order.id, "Failed to queue order confirmation");
        }
    }
}

/// Generate a human-facing order number: date plus a random hex suffix.
/// Collisions are resolved by retrying with a fresh suffix.
fn generate_order_number(now: DateTime<Utc>) -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(6);
    format!("GG-{}-{}", now.format("%Y%m%d"), token.to_uppercase())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_order_number_shape() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 10, 30, 0).unwrap();
        let number = generate_order_number(now);

        assert!(number.starts_with("GG-20260315-"));
        assert_eq!(number.len(), "GG-20260315-".len() + 6);
    }

    #[test]
    fn test_order_numbers_differ() {
        let now = Utc::now();
        assert_ne!(generate_order_number(now), generate_order_number(now));
    }
}
