//! Order domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use green_grocer_core::{
    Money, OrderId, OrderItemId, OrderStatus, PaymentStatus, PriceSource, ProductId,
    ReservationId, UserId,
};

/// A wholesale order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// Human-facing order number (e.g. "GG-20260315-9F2C4A").
    pub order_number: String,
    /// Customer who placed the order.
    pub user_id: UserId,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Payment status, tracked separately.
    pub payment_status: PaymentStatus,
    /// Sum of line totals before discounts.
    pub subtotal: Money,
    /// Order-level loyalty discount.
    pub discount_amount: Money,
    /// Shipping cost.
    pub shipping_cost: Money,
    /// `subtotal - discount_amount + shipping_cost`.
    pub total_amount: Money,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
    /// When the order was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// The amount that counts toward loyalty spend and points.
    ///
    /// Shipping is excluded: `subtotal - discount_amount`.
    #[must_use]
    pub fn eligible_amount(&self) -> Money {
        self.subtotal - self.discount_amount
    }
}

/// A single order line. Snapshots the product at order time and is never
/// updated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    /// Unique item ID.
    pub id: OrderItemId,
    /// Owning order.
    pub order_id: OrderId,
    /// Product ordered.
    pub product_id: ProductId,
    /// Product SKU at order time.
    pub sku: String,
    /// Product name at order time.
    pub name: String,
    /// Units ordered.
    pub quantity: i64,
    /// Resolved per-unit price at order time.
    pub unit_price: Money,
    /// `unit_price * quantity`.
    pub line_total: Money,
    /// Which pricing rule produced the unit price.
    pub price_source: PriceSource,
}

/// An order together with its line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithItems {
    /// The order itself.
    #[serde(flatten)]
    pub order: Order,
    /// Line items.
    pub items: Vec<OrderItem>,
}

/// One reserved line of stock. Released exactly once on cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReservation {
    /// Unique reservation ID.
    pub id: ReservationId,
    /// Order the reservation belongs to.
    pub order_id: OrderId,
    /// Product reserved.
    pub product_id: ProductId,
    /// Units reserved.
    pub quantity: i64,
    /// When the reservation was made.
    pub created_at: DateTime<Utc>,
    /// When the reservation was released; `None` while held.
    pub released_at: Option<DateTime<Utc>>,
}

/// One requested line in an order-creation request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderLine {
    /// Product to order.
    pub product_id: ProductId,
    /// Units requested.
    pub quantity: i64,
}

/// Record of points awarded for one paid order.
///
/// The unique order ID constraint is what makes accrual idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointAward {
    /// Order the points were awarded for.
    pub order_id: OrderId,
    /// User who received the points.
    pub user_id: UserId,
    /// Points awarded.
    pub points: i64,
    /// When the award was recorded.
    pub awarded_at: DateTime<Utc>,
}
