//! Catalog route handlers.
//!
//! The listing and detail responses are identical for every customer
//! (negotiated pricing is resolved at order time, not here), so both are
//! served through the shared catalog cache.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::instrument;

use green_grocer_core::ProductId;

use crate::db::{PricingRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::models::pricing::PriceTier;
use crate::models::product::Product;
use crate::state::{AppState, CatalogEntry};

/// Cache key for the active-product listing.
const LIST_CACHE_KEY: &str = "products";

/// One product in the listing response.
#[derive(Debug, Serialize)]
pub struct ProductSummary {
    /// The product.
    #[serde(flatten)]
    pub product: Product,
    /// Whether ordering more unlocks a better unit price.
    pub has_volume_pricing: bool,
}

/// The product detail response.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    /// The product.
    #[serde(flatten)]
    pub product: Product,
    /// Quantity-discount tiers, ascending by minimum quantity.
    pub price_tiers: Vec<PriceTier>,
    /// Whether ordering more unlocks a better unit price.
    pub has_volume_pricing: bool,
}

/// List active products.
///
/// # Route
///
/// `GET /products`
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<Vec<ProductSummary>>> {
    let (products, tiered) = match state.catalog_cache().get(LIST_CACHE_KEY).await {
        Some(CatalogEntry::List { products, tiered }) => (products, tiered),
        _ => {
            let products = Arc::new(ProductRepository::new(state.pool()).list_active().await?);
            let tiered: Arc<HashSet<ProductId>> = Arc::new(
                PricingRepository::new(state.pool())
                    .tiered_product_ids()
                    .await?
                    .into_iter()
                    .collect(),
            );

            state
                .catalog_cache()
                .insert(
                    LIST_CACHE_KEY.to_string(),
                    CatalogEntry::List {
                        products: Arc::clone(&products),
                        tiered: Arc::clone(&tiered),
                    },
                )
                .await;

            (products, tiered)
        }
    };

    let summaries = products
        .iter()
        .map(|product| ProductSummary {
            has_volume_pricing: tiered.contains(&product.id),
            product: product.clone(),
        })
        .collect();

    Ok(Json(summaries))
}

/// Show one product with its quantity tiers.
///
/// # Route
///
/// `GET /products/{slug}`
///
/// # Errors
///
/// Returns 404 if no active product carries the slug.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn show(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(slug): Path<String>,
) -> Result<Json<ProductDetail>> {
    let cache_key = format!("product:{slug}");

    let (product, tiers) = match state.catalog_cache().get(&cache_key).await {
        Some(CatalogEntry::Detail { product, tiers }) => (product, tiers),
        _ => {
            let product = ProductRepository::new(state.pool())
                .find_by_slug(&slug)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| AppError::NotFound(format!("no product '{slug}'")))?;
            let tiers = Arc::new(
                PricingRepository::new(state.pool())
                    .tiers_for_product(product.id)
                    .await?,
            );

            let product = Box::new(product);
            state
                .catalog_cache()
                .insert(
                    cache_key,
                    CatalogEntry::Detail {
                        product: product.clone(),
                        tiers: Arc::clone(&tiers),
                    },
                )
                .await;

            (product, tiers)
        }
    };

    Ok(Json(ProductDetail {
        product: *product,
        has_volume_pricing: !tiers.is_empty(),
        price_tiers: tiers.as_ref().clone(),
    }))
}
