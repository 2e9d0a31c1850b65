//! HTTP route handlers for the wholesale ordering API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                      - Liveness check
//! GET  /health/ready                - Readiness check (database ping)
//!
//! # Catalog
//! GET  /products                    - Active product listing
//! GET  /products/{slug}             - Product detail with quantity tiers
//!
//! # Orders
//! POST /orders                      - Place an order
//! GET  /orders                      - List orders (staff: all, customer: own)
//! GET  /orders/{id}                 - Order detail with items
//! POST /orders/{id}/cancel          - Cancel (owner while pending, staff any open)
//! POST /orders/{id}/confirm-payment - Record payment received (staff)
//! POST /orders/{id}/complete        - Mark fulfilled (staff)
//!
//! # Account
//! GET  /me                          - Current user with points and tier
//!
//! # Staff catalog management
//! GET    /admin/products                - Full product listing (incl. inactive)
//! POST   /admin/products                - Create product
//! PATCH  /admin/products/{id}           - Update product
//! DELETE /admin/products/{id}           - Delete product
//! POST   /admin/products/{id}/tiers     - Add quantity tier
//! DELETE /admin/tiers/{id}              - Remove quantity tier
//! POST   /admin/products/{id}/batches   - Receive stock batch
//! GET    /admin/products/{id}/batches   - List batches
//! POST   /admin/brands                  - Create brand
//! GET    /admin/brands                  - List brands
//! POST   /admin/categories              - Create category
//! GET    /admin/categories              - List categories
//! POST   /admin/price-lists             - Create customer price entry
//! DELETE /admin/price-lists/{id}        - Remove customer price entry
//! GET    /admin/users/{id}/price-lists  - A customer's price entries
//! POST   /admin/loyalty-tiers           - Create loyalty tier
//! POST   /admin/jobs/{name}             - Trigger a background job
//! ```

pub mod account;
pub mod admin;
pub mod orders;
pub mod products;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(orders::create).get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/confirm-payment", post(orders::confirm_payment))
        .route("/{id}/complete", post(orders::complete))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
}

/// Create the staff management routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/products",
            get(admin::list_products).post(admin::create_product),
        )
        .route(
            "/products/{id}",
            axum::routing::patch(admin::update_product).delete(admin::delete_product),
        )
        .route("/products/{id}/tiers", post(admin::create_tier))
        .route("/tiers/{id}", axum::routing::delete(admin::delete_tier))
        .route(
            "/products/{id}/batches",
            get(admin::list_batches).post(admin::create_batch),
        )
        .route("/brands", get(admin::list_brands).post(admin::create_brand))
        .route(
            "/categories",
            get(admin::list_categories).post(admin::create_category),
        )
        .route("/price-lists", post(admin::create_price_list))
        .route(
            "/price-lists/{id}",
            axum::routing::delete(admin::delete_price_list),
        )
        .route("/users/{id}/price-lists", get(admin::user_price_lists))
        .route("/loyalty-tiers", post(admin::create_loyalty_tier))
        .route("/jobs/{name}", post(admin::trigger_job))
}

/// Assemble every route under one router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/me", get(account::me))
        .nest("/products", product_routes())
        .nest("/orders", order_routes())
        .nest("/admin", admin_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
