//! Business logic services for the wholesale API.
//!
//! Services own the multi-step flows and the transactions they need;
//! repositories under [`crate::db`] own the SQL. Route handlers call
//! services and translate [`crate::error::DomainError`] into HTTP.
//!
//! # Services
//!
//! - `pricing` - Effective unit price resolution (price lists, volume tiers, base)
//! - `stock` - Quantity validation and inventory reconciliation
//! - `orders` - Order placement, payment, cancellation, completion
//! - `loyalty` - Point accrual and tier re-evaluation after payment

pub mod loyalty;
pub mod orders;
pub mod pricing;
pub mod stock;

pub use loyalty::LoyaltyService;
pub use orders::OrderService;
pub use pricing::PricingService;
pub use stock::StockService;
