//! Staff catalog and operations route handlers.
//!
//! Every handler requires a staff user. Mutations that change what the
//! public catalog shows drop the catalog cache on success.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use green_grocer_core::{PriceListId, PriceTierId, ProductId, UserId};

use crate::db::{LoyaltyRepository, PricingRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::jobs::{self, JobKind, JobOutcome};
use crate::middleware::RequireStaff;
use crate::models::loyalty::{CreateLoyaltyTierInput, LoyaltyTier};
use crate::models::pricing::{
    CreatePriceListInput, CreatePriceTierInput, CustomerPriceList, PriceTier,
};
use crate::models::product::{
    Brand, Category, CreateBatchInput, CreateProductInput, Product, ProductBatch,
    UpdateProductInput,
};
use crate::services::StockService;
use crate::state::AppState;

/// Request body for creating a brand or category.
#[derive(Debug, Deserialize)]
pub struct CreateTaxonRequest {
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
}

// =============================================================================
// Products
// =============================================================================

/// List every product, including inactive ones.
///
/// # Route
///
/// `GET /admin/products`
///
/// # Errors
///
/// Returns an error if the listing query fails.
#[instrument(skip_all)]
pub async fn list_products(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
) -> Result<Json<Vec<Product>>> {
    let products = ProductRepository::new(state.pool()).list_all().await?;
    Ok(Json(products))
}

/// Create a product.
///
/// # Route
///
/// `POST /admin/products`
///
/// # Errors
///
/// Returns 409 if the SKU or slug is already taken.
#[instrument(skip_all, fields(sku = %body.sku))]
pub async fn create_product(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Json(body): Json<CreateProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = ProductRepository::new(state.pool())
        .create(&body, Utc::now())
        .await?;

    state.invalidate_catalog();
    Ok((StatusCode::CREATED, Json(product)))
}

/// Update a product. Omitted fields are left unchanged.
///
/// # Route
///
/// `PATCH /admin/products/{id}`
///
/// # Errors
///
/// Returns 404 if the product does not exist.
#[instrument(skip_all, fields(product_id = id))]
pub async fn update_product(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Path(id): Path<i64>,
    Json(body): Json<UpdateProductInput>,
) -> Result<Json<Product>> {
    let product = ProductRepository::new(state.pool())
        .update(ProductId::new(id), &body, Utc::now())
        .await?;

    state.invalidate_catalog();
    Ok(Json(product))
}

/// Delete a product.
///
/// # Route
///
/// `DELETE /admin/products/{id}`
///
/// # Errors
///
/// Returns 404 if the product does not exist.
#[instrument(skip_all, fields(product_id = id))]
pub async fn delete_product(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    ProductRepository::new(state.pool())
        .delete(ProductId::new(id))
        .await?;

    state.invalidate_catalog();
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Quantity tiers
// =============================================================================

/// Add a quantity tier to a product.
///
/// # Route
///
/// `POST /admin/products/{id}/tiers`
///
/// # Errors
///
/// Returns an error if the insert fails.
#[instrument(skip_all, fields(product_id = id))]
pub async fn create_tier(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Path(id): Path<i64>,
    Json(body): Json<CreatePriceTierInput>,
) -> Result<(StatusCode, Json<PriceTier>)> {
    let tier = PricingRepository::new(state.pool())
        .create_tier(ProductId::new(id), &body, Utc::now())
        .await?;

    state.invalidate_catalog();
    Ok((StatusCode::CREATED, Json(tier)))
}

/// Remove a quantity tier.
///
/// # Route
///
/// `DELETE /admin/tiers/{id}`
///
/// # Errors
///
/// Returns 404 if the tier does not exist.
#[instrument(skip_all, fields(tier_id = id))]
pub async fn delete_tier(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    PricingRepository::new(state.pool())
        .delete_tier(PriceTierId::new(id))
        .await?;

    state.invalidate_catalog();
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Batches
// =============================================================================

/// List a product's batches.
///
/// # Route
///
/// `GET /admin/products/{id}/batches`
///
/// # Errors
///
/// Returns an error if the listing query fails.
#[instrument(skip_all, fields(product_id = id))]
pub async fn list_batches(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ProductBatch>>> {
    let batches = ProductRepository::new(state.pool())
        .batches_for(ProductId::new(id))
        .await?;

    Ok(Json(batches))
}

/// Receive a stock batch: records it and adds its units to sellable stock.
///
/// # Route
///
/// `POST /admin/products/{id}/batches`
///
/// # Errors
///
/// Returns 404 if the product does not exist, 409 if the batch number is
/// already recorded.
#[instrument(skip_all, fields(product_id = id, batch = %body.batch_number))]
pub async fn create_batch(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Path(id): Path<i64>,
    Json(body): Json<CreateBatchInput>,
) -> Result<(StatusCode, Json<ProductBatch>)> {
    let batch = StockService::new(state.pool())
        .receive_batch(ProductId::new(id), &body, Utc::now())
        .await?;

    state.invalidate_catalog();
    Ok((StatusCode::CREATED, Json(batch)))
}

// =============================================================================
// Brands and categories
// =============================================================================

/// List brands.
///
/// # Route
///
/// `GET /admin/brands`
///
/// # Errors
///
/// Returns an error if the listing query fails.
#[instrument(skip_all)]
pub async fn list_brands(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
) -> Result<Json<Vec<Brand>>> {
    let brands = ProductRepository::new(state.pool()).list_brands().await?;
    Ok(Json(brands))
}

/// Create a brand.
///
/// # Route
///
/// `POST /admin/brands`
///
/// # Errors
///
/// Returns 409 if the slug is already taken.
#[instrument(skip_all, fields(slug = %body.slug))]
pub async fn create_brand(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Json(body): Json<CreateTaxonRequest>,
) -> Result<(StatusCode, Json<Brand>)> {
    let brand = ProductRepository::new(state.pool())
        .create_brand(&body.name, &body.slug, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(brand)))
}

/// List categories.
///
/// # Route
///
/// `GET /admin/categories`
///
/// # Errors
///
/// Returns an error if the listing query fails.
#[instrument(skip_all)]
pub async fn list_categories(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
) -> Result<Json<Vec<Category>>> {
    let categories = ProductRepository::new(state.pool()).list_categories().await?;
    Ok(Json(categories))
}

/// Create a category.
///
/// # Route
///
/// `POST /admin/categories`
///
/// # Errors
///
/// Returns 409 if the slug is already taken.
#[instrument(skip_all, fields(slug = %body.slug))]
pub async fn create_category(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Json(body): Json<CreateTaxonRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    let category = ProductRepository::new(state.pool())
        .create_category(&body.name, &body.slug, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(category)))
}

// =============================================================================
// Customer price lists
// =============================================================================

/// Create a negotiated price entry for a customer.
///
/// # Route
///
/// `POST /admin/price-lists`
///
/// # Errors
///
/// Returns an error if the insert fails.
#[instrument(skip_all, fields(user_id = %body.user_id))]
pub async fn create_price_list(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Json(body): Json<CreatePriceListInput>,
) -> Result<(StatusCode, Json<CustomerPriceList>)> {
    let entry = PricingRepository::new(state.pool())
        .create_entry(body.user_id, &body, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

/// Remove a negotiated price entry.
///
/// # Route
///
/// `DELETE /admin/price-lists/{id}`
///
/// # Errors
///
/// Returns 404 if the entry does not exist.
#[instrument(skip_all, fields(entry_id = id))]
pub async fn delete_price_list(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    PricingRepository::new(state.pool())
        .delete_entry(PriceListId::new(id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// List a customer's negotiated price entries, newest first.
///
/// # Route
///
/// `GET /admin/users/{id}/price-lists`
///
/// # Errors
///
/// Returns an error if the listing query fails.
#[instrument(skip_all, fields(user_id = id))]
pub async fn user_price_lists(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Path(id): Path<i64>,
) -> Result<Json<Vec<CustomerPriceList>>> {
    let entries = PricingRepository::new(state.pool())
        .entries_for_user(UserId::new(id))
        .await?;

    Ok(Json(entries))
}

// =============================================================================
// Loyalty tiers
// =============================================================================

/// Create a loyalty tier.
///
/// # Route
///
/// `POST /admin/loyalty-tiers`
///
/// # Errors
///
/// Returns 409 if the tier name is already taken.
#[instrument(skip_all, fields(name = %body.name))]
pub async fn create_loyalty_tier(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Json(body): Json<CreateLoyaltyTierInput>,
) -> Result<(StatusCode, Json<LoyaltyTier>)> {
    let tier = LoyaltyRepository::new(state.pool())
        .create_tier(&body, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(tier)))
}

// =============================================================================
// Jobs
// =============================================================================

/// Trigger a background job and wait for its summary.
///
/// # Route
///
/// `POST /admin/jobs/{name}`
///
/// # Errors
///
/// Returns 404 for an unknown job name, 409 if the job is already running.
#[instrument(skip_all, fields(job = %name, actor = %staff.id))]
pub async fn trigger_job(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(name): Path<String>,
) -> Result<Json<JobOutcome>> {
    let job = name.parse::<JobKind>().map_err(AppError::NotFound)?;

    tracing::info!("Job triggered manually");
    let outcome = jobs::run(&state, job).await?;

    Ok(Json(outcome))
}
