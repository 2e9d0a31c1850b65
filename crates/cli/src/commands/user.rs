//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a customer and print their API token
//! gg-cli user create -n "Karachi Mart" -p "+92 300 1234567"
//!
//! # Create a staff account
//! gg-cli user create -n "Warehouse Desk" -p "+92 300 7654321" -r staff
//!
//! # List all users
//! gg-cli user list
//! ```
//!
//! # Environment Variables
//!
//! - `GROCER_DATABASE_PATH` - `SQLite` database file path (falls back to
//!   `DATABASE_PATH`)

use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

use green_grocer_core::{Phone, UserRole};
use green_grocer_server::db::{self, RepositoryError, UserRepository};
use green_grocer_server::middleware::generate_api_token;
use green_grocer_server::models::user::CreateUserInput;

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository operation failed.
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: customer, staff, admin")]
    InvalidRole(String),

    /// Invalid phone number.
    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),
}

/// Create a new user and print their API token.
///
/// The token is generated here and stored on the user row; it is the only
/// time it is shown.
///
/// # Errors
///
/// Returns `UserError` if the role or phone is invalid, or if the phone
/// number is already registered.
pub async fn create(name: &str, phone: &str, role: &str) -> Result<(), UserError> {
    dotenvy::dotenv().ok();

    let role: UserRole = role
        .parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))?;
    let phone = Phone::parse(phone).map_err(|e| UserError::InvalidPhone(e.to_string()))?;

    let pool = connect().await?;

    info!("Creating user: {} ({})", name, role);

    let token = generate_api_token();
    let input = CreateUserInput {
        name: name.to_owned(),
        phone,
        role,
    };
    let user = UserRepository::new(&pool)
        .create(&input, &token, Utc::now())
        .await?;

    info!(
        "User created successfully! ID: {}, Phone: {}, Role: {}",
        user.id, user.phone, user.role
    );
    info!("API token: {token}");
    warn!("Store the token now; it cannot be retrieved later.");

    Ok(())
}

/// List all users, newest first.
///
/// # Errors
///
/// Returns `UserError` if the database cannot be reached.
pub async fn list() -> Result<(), UserError> {
    dotenvy::dotenv().ok();

    let pool = connect().await?;
    let users = UserRepository::new(&pool).list().await?;

    info!("{} user(s)", users.len());
    for user in users {
        info!(
            "  [{}] {} ({}) - {} - {} points",
            user.id, user.name, user.role, user.phone, user.points
        );
    }

    Ok(())
}

async fn connect() -> Result<SqlitePool, UserError> {
    let database_path = std::env::var("GROCER_DATABASE_PATH")
        .or_else(|_| std::env::var("DATABASE_PATH"))
        .map_err(|_| UserError::MissingEnvVar("GROCER_DATABASE_PATH"))?;
    Ok(db::create_pool(&database_path).await?)
}
