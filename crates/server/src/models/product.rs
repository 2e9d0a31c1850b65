//! Product catalog domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use green_grocer_core::{BatchId, BrandId, CategoryId, Money, ProductId};

/// A product brand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    /// Unique brand ID.
    pub id: BrandId,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
    /// When the brand was created.
    pub created_at: DateTime<Utc>,
}

/// A product category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Unique category ID.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
    /// When the category was created.
    pub created_at: DateTime<Utc>,
}

/// A sellable product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Stock keeping unit, unique across the catalog.
    pub sku: String,
    /// URL slug, unique across the catalog.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Base unit price before any tier or customer pricing.
    pub base_price: Money,
    /// Available aggregate stock. Never negative.
    pub stock: i64,
    /// Smallest quantity a customer may order.
    pub min_order_qty: i64,
    /// Order quantity must be a multiple of this.
    pub order_increment: i64,
    /// Inactive products are hidden and cannot be ordered.
    pub is_active: bool,
    /// Highlighted in catalog listings.
    pub is_featured: bool,
    /// Owning brand, if any.
    pub brand_id: Option<BrandId>,
    /// Owning category, if any.
    pub category_id: Option<CategoryId>,
    /// When the product was created.
    pub created_at: DateTime<Utc>,
    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A dated batch of units underlying a product's aggregate stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductBatch {
    /// Unique batch ID.
    pub id: BatchId,
    /// Product this batch belongs to.
    pub product_id: ProductId,
    /// Supplier batch number, unique per product.
    pub batch_number: String,
    /// Units in this batch.
    pub quantity: i64,
    /// Expiry date, if the product is perishable.
    pub expires_at: Option<DateTime<Utc>>,
    /// Set by the expiry job once `expires_at` has passed.
    pub expired: bool,
    /// When the batch was recorded.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new product.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductInput {
    /// Stock keeping unit.
    pub sku: String,
    /// URL slug.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Base unit price in minor units.
    pub base_price: Money,
    /// Initial stock level.
    #[serde(default)]
    pub stock: i64,
    /// Minimum order quantity.
    #[serde(default = "default_one")]
    pub min_order_qty: i64,
    /// Order increment.
    #[serde(default = "default_one")]
    pub order_increment: i64,
    /// Owning brand.
    pub brand_id: Option<BrandId>,
    /// Owning category.
    pub category_id: Option<CategoryId>,
    /// Whether the product is immediately orderable.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Whether the product is featured.
    #[serde(default)]
    pub is_featured: bool,
}

/// Input for updating a product. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductInput {
    /// New display name.
    pub name: Option<String>,
    /// New base price.
    pub base_price: Option<Money>,
    /// New minimum order quantity.
    pub min_order_qty: Option<i64>,
    /// New order increment.
    pub order_increment: Option<i64>,
    /// New active flag.
    pub is_active: Option<bool>,
    /// New featured flag.
    pub is_featured: Option<bool>,
}

/// Input for recording a new product batch.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBatchInput {
    /// Supplier batch number.
    pub batch_number: String,
    /// Units in the batch.
    pub quantity: i64,
    /// Expiry date, if perishable.
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_one() -> i64 {
    1
}

const fn default_true() -> bool {
    true
}
