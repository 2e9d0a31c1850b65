//! Shared harness for the end-to-end tests in `tests/`.
//!
//! [`TestContext`] assembles the real application router on an in-memory
//! database and drives it with `tower::ServiceExt::oneshot`, so requests
//! pass through the same extractors, handlers, and error mapping as in
//! production without binding a socket. Fixture helpers insert users,
//! products, and pricing rules through the server's own repositories; a
//! couple of helpers touch the database directly where no API exists
//! (backdating an order, counting queued notifications).

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc)] // helpers panic on setup failure

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::{Duration, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt;

use green_grocer_core::{Money, NotificationKind, OrderId, Phone, ProductId, UserId, UserRole};
use green_grocer_server::config::ServerConfig;
use green_grocer_server::db::{self, LoyaltyRepository, PricingRepository, ProductRepository, UserRepository};
use green_grocer_server::middleware::generate_api_token;
use green_grocer_server::models::loyalty::{CreateLoyaltyTierInput, LoyaltyTier};
use green_grocer_server::models::order::{NewOrderLine, OrderWithItems};
use green_grocer_server::models::pricing::{CreatePriceTierInput, PriceTier};
use green_grocer_server::models::product::{CreateProductInput, Product};
use green_grocer_server::models::user::{CreateUserInput, User};
use green_grocer_server::services::{OrderService, StockService};
use green_grocer_server::state::AppState;

/// A fully wired application over a fresh in-memory database.
pub struct TestContext {
    /// Shared application state, for driving services and jobs directly.
    pub state: AppState,
    app: Router,
    phone_counter: AtomicU64,
}

/// One response from the application, with the body already collected.
pub struct TestResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response body: parsed JSON, or a JSON string for plain-text bodies.
    pub body: Value,
}

impl TestResponse {
    /// The machine-readable error code, or `""` for non-error bodies.
    #[must_use]
    pub fn error_code(&self) -> &str {
        self.body
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// Configuration for tests: no gateway, no Sentry, free shipping, and the
/// default orphan threshold. The database path is a placeholder; the pool
/// is built separately on `sqlite::memory:`.
#[must_use]
pub fn test_config() -> ServerConfig {
    ServerConfig {
        database_path: ":memory:".to_string(),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        shipping_flat_rate: Money::zero(),
        orphan_cleanup_hours: 24,
        whatsapp: None,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// A minimal active product: no brand or category, orderable one unit at
/// a time. Tests tighten `min_order_qty` and `order_increment` as needed.
#[must_use]
pub fn product_input(sku: &str, base_price: i64, stock: i64) -> CreateProductInput {
    CreateProductInput {
        sku: sku.to_string(),
        slug: sku.to_lowercase(),
        name: sku.to_string(),
        base_price: Money::from_minor(base_price),
        stock,
        min_order_qty: 1,
        order_increment: 1,
        brand_id: None,
        category_id: None,
        is_active: true,
        is_featured: false,
    }
}

impl TestContext {
    /// Build the application with [`test_config`].
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Build the application with a caller-adjusted configuration.
    pub async fn with_config(config: ServerConfig) -> Self {
        let pool = db::create_test_pool().await.expect("test pool");
        let state = AppState::new(config, pool).expect("app state");
        let app = green_grocer_server::app(state.clone());

        Self {
            state,
            app,
            phone_counter: AtomicU64::new(0),
        }
    }

    /// The underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        self.state.pool()
    }

    /// An order service wired like the handlers build it.
    #[must_use]
    pub fn order_service(&self) -> OrderService<'_> {
        OrderService::new(self.state.pool(), self.state.config().shipping_flat_rate)
    }

    /// A stock service wired like the handlers build it.
    #[must_use]
    pub fn stock_service(&self) -> StockService<'_> {
        StockService::new(self.state.pool())
    }

    // =========================================================================
    // Fixtures
    // =========================================================================

    /// Create a user with a fresh API token and a unique phone number.
    pub async fn create_user(&self, name: &str, role: UserRole) -> (User, String) {
        let n = self.phone_counter.fetch_add(1, Ordering::Relaxed);
        let phone = Phone::parse(&format!("+92300{n:07}")).expect("valid phone");
        let input = CreateUserInput {
            name: name.to_string(),
            phone,
            role,
        };

        let token = generate_api_token();
        let user = UserRepository::new(self.state.pool())
            .create(&input, &token, Utc::now())
            .await
            .expect("create user");

        (user, token)
    }

    /// Create a customer.
    pub async fn create_customer(&self, name: &str) -> (User, String) {
        self.create_user(name, UserRole::Customer).await
    }

    /// Create a staff user.
    pub async fn create_staff(&self, name: &str) -> (User, String) {
        self.create_user(name, UserRole::Staff).await
    }

    /// Create a product from [`product_input`] defaults.
    pub async fn create_product(&self, sku: &str, base_price: i64, stock: i64) -> Product {
        self.create_product_with(product_input(sku, base_price, stock)).await
    }

    /// Create a product from a caller-adjusted input.
    pub async fn create_product_with(&self, input: CreateProductInput) -> Product {
        ProductRepository::new(self.state.pool())
            .create(&input, Utc::now())
            .await
            .expect("create product")
    }

    /// Add a fixed-price quantity tier to a product.
    pub async fn create_quantity_tier(
        &self,
        product_id: ProductId,
        min_quantity: i64,
        max_quantity: Option<i64>,
        unit_price: i64,
    ) -> PriceTier {
        let input = CreatePriceTierInput {
            min_quantity,
            max_quantity,
            unit_price: Some(Money::from_minor(unit_price)),
            discount_bps: None,
        };

        PricingRepository::new(self.state.pool())
            .create_tier(product_id, &input, Utc::now())
            .await
            .expect("create quantity tier")
    }

    /// Create a loyalty tier.
    pub async fn create_loyalty_tier(
        &self,
        name: &str,
        min_spend: i64,
        discount_bps: i64,
        point_multiplier_bps: i64,
        free_shipping: bool,
    ) -> LoyaltyTier {
        let input = CreateLoyaltyTierInput {
            name: name.to_string(),
            min_spend: Money::from_minor(min_spend),
            discount_bps,
            point_multiplier_bps,
            free_shipping,
        };

        LoyaltyRepository::new(self.state.pool())
            .create_tier(&input, Utc::now())
            .await
            .expect("create loyalty tier")
    }

    /// Place a single-line order through the order service.
    pub async fn place_order(
        &self,
        customer: &User,
        product_id: ProductId,
        quantity: i64,
    ) -> OrderWithItems {
        self.order_service()
            .create(
                customer,
                &[NewOrderLine {
                    product_id,
                    quantity,
                }],
                Utc::now(),
            )
            .await
            .expect("place order")
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Send one request through the router and collect the response.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("route request");
        let status = response.status();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("collect body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse { status, body }
    }

    /// `GET` a path.
    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, path, token, None).await
    }

    /// `POST` a path, with an optional JSON body.
    pub async fn post(&self, path: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        self.request(Method::POST, path, token, body).await
    }

    /// `PATCH` a path with a JSON body.
    pub async fn patch(&self, path: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PATCH, path, token, Some(body)).await
    }

    /// `DELETE` a path.
    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, path, token, None).await
    }

    // =========================================================================
    // Database shortcuts
    // =========================================================================

    /// Shift an order's creation time `hours` into the past.
    pub async fn backdate_order(&self, order_id: OrderId, hours: i64) {
        sqlx::query("UPDATE orders SET created_at = ?2 WHERE id = ?1")
            .bind(order_id.as_i64())
            .bind(Utc::now() - Duration::hours(hours))
            .execute(self.state.pool())
            .await
            .expect("backdate order");
    }

    /// Assign a loyalty tier directly, bypassing the spend-based evaluation.
    pub async fn assign_loyalty_tier(&self, user_id: UserId, tier: &LoyaltyTier) {
        sqlx::query("UPDATE users SET loyalty_tier_id = ?2 WHERE id = ?1")
            .bind(user_id.as_i64())
            .bind(tier.id.as_i64())
            .execute(self.state.pool())
            .await
            .expect("assign loyalty tier");
    }

    /// Current aggregate stock for a product.
    pub async fn product_stock(&self, product_id: ProductId) -> i64 {
        sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
            .bind(product_id.as_i64())
            .fetch_one(self.state.pool())
            .await
            .expect("read stock")
    }

    /// Number of notifications of one kind, in any delivery state.
    pub async fn notification_count(&self, kind: NotificationKind) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE kind = ?1")
            .bind(kind)
            .fetch_one(self.state.pool())
            .await
            .expect("count notifications")
    }
}
