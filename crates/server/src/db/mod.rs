//! Database operations for the wholesale ordering `SQLite` database.
//!
//! ## Tables
//!
//! - `users`, `loyalty_tiers` - Customers, staff, and the tier ladder
//! - `brands`, `categories`, `products`, `product_batches` - Catalog
//! - `price_tiers`, `customer_price_lists` - Pricing rules
//! - `orders`, `order_items`, `stock_reservations`, `point_awards` - Orders
//! - `notifications`, `audit_log` - Outbox and audit trail
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p green-grocer-cli -- migrate run
//! ```

pub mod audit;
pub mod loyalty;
pub mod notifications;
pub mod orders;
pub mod price_lists;
pub mod products;
pub mod users;

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use thiserror::Error;

pub use audit::AuditRepository;
pub use loyalty::LoyaltyRepository;
pub use notifications::NotificationRepository;
pub use orders::OrderRepository;
pub use price_lists::PricingRepository;
pub use products::ProductRepository;
pub use users::UserRepository;

/// Embedded migrations from `crates/server/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate SKU).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `SQLite` connection pool with sensible defaults.
///
/// Enables WAL journaling for concurrent reads, NORMAL synchronous mode, and
/// foreign key enforcement. The database file is created if missing.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_path: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{database_path}?mode=rwc"))?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}

/// Create an in-memory pool with migrations applied, for tests.
///
/// In-memory `SQLite` lives and dies with its connection, so the pool is
/// pinned to a single connection.
///
/// # Errors
///
/// Returns `sqlx::Error` if the pool cannot be created or migrations fail.
pub async fn create_test_pool() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    MIGRATOR.run(&pool).await.map_err(sqlx::Error::from)?;

    Ok(pool)
}
