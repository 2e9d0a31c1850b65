//! Unified error handling with Sentry integration.
//!
//! Business-rule violations are modeled as [`DomainError`] variants carrying
//! the specific fields of the violation, so callers match on kinds instead of
//! parsing messages. They surface as structured 4xx responses and are logged
//! at warning level. System failures surface as 5xx, are logged at error
//! level, and are captured to Sentry.
//!
//! All route handlers return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use green_grocer_core::{OrderId, ProductId};

use crate::db::RepositoryError;

/// Business-rule violations from the pricing, stock, and order components.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The referenced product does not exist or is inactive.
    #[error("Product {product_id} not found")]
    ProductNotFound {
        /// Product that was requested.
        product_id: ProductId,
    },

    /// The requested quantity violates the product's minimum order quantity
    /// or order increment.
    #[error(
        "Invalid quantity {requested} for product {product_id} (min {min_order_qty}, increment {order_increment})"
    )]
    InvalidQuantity {
        product_id: ProductId,
        requested: i64,
        min_order_qty: i64,
        order_increment: i64,
    },

    /// Not enough stock to cover the requested quantity.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// The order is not in a state that permits the requested operation.
    #[error("Invalid operation on order {order_id}: {reason}")]
    InvalidOrderOperation { order_id: OrderId, reason: String },

    /// Database operation failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl DomainError {
    /// Machine-readable error code for the response body.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProductNotFound { .. } => "product_not_found",
            Self::InvalidQuantity { .. } => "invalid_quantity",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::InvalidOrderOperation { .. } => "invalid_order_operation",
            Self::Repository(RepositoryError::NotFound) => "not_found",
            Self::Repository(_) => "internal_error",
        }
    }
}

/// Application-level error type for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Business-rule violation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Database operation failed outside a domain flow.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or invalid credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Domain(err) => match err {
                DomainError::ProductNotFound { .. } => StatusCode::NOT_FOUND,
                DomainError::InvalidQuantity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DomainError::InsufficientStock { .. }
                | DomainError::InvalidOrderOperation { .. } => StatusCode::CONFLICT,
                DomainError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
                DomainError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
                DomainError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Builds the `{"error": {...}}` response body.
    ///
    /// Domain variants carry their violation fields; internal errors are
    /// reduced to a generic message so details never leak to clients.
    fn body(&self) -> serde_json::Value {
        match self {
            Self::Domain(DomainError::ProductNotFound { product_id }) => json!({
                "error": {
                    "code": "product_not_found",
                    "message": self.to_string(),
                    "product_id": product_id,
                }
            }),
            Self::Domain(DomainError::InvalidQuantity {
                product_id,
                requested,
                min_order_qty,
                order_increment,
            }) => json!({
                "error": {
                    "code": "invalid_quantity",
                    "message": self.to_string(),
                    "product_id": product_id,
                    "requested": requested,
                    "min_order_qty": min_order_qty,
                    "order_increment": order_increment,
                }
            }),
            Self::Domain(DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            }) => json!({
                "error": {
                    "code": "insufficient_stock",
                    "message": self.to_string(),
                    "product_id": product_id,
                    "requested": requested,
                    "available": available,
                }
            }),
            Self::Domain(DomainError::InvalidOrderOperation { order_id, reason }) => json!({
                "error": {
                    "code": "invalid_order_operation",
                    "message": self.to_string(),
                    "order_id": order_id,
                    "reason": reason,
                }
            }),
            Self::Domain(DomainError::Repository(RepositoryError::NotFound))
            | Self::Database(RepositoryError::NotFound)
            | Self::NotFound(_) => json!({
                "error": { "code": "not_found", "message": self.to_string() }
            }),
            Self::Domain(DomainError::Repository(RepositoryError::Conflict(_)))
            | Self::Database(RepositoryError::Conflict(_))
            | Self::Conflict(_) => json!({
                "error": { "code": "conflict", "message": self.to_string() }
            }),
            Self::Unauthorized(_) => json!({
                "error": { "code": "unauthorized", "message": self.to_string() }
            }),
            Self::Forbidden(_) => json!({
                "error": { "code": "forbidden", "message": self.to_string() }
            }),
            Self::BadRequest(_) => json!({
                "error": { "code": "bad_request", "message": self.to_string() }
            }),
            Self::Domain(DomainError::Repository(_)) | Self::Database(_) | Self::Internal(_) => {
                json!({
                    "error": { "code": "internal_error", "message": "Internal server error" }
                })
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(self.body())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_display() {
        let err = DomainError::InsufficientStock {
            product_id: ProductId::new(7),
            requested: 50,
            available: 12,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product 7: requested 50, available 12"
        );
    }

    #[test]
    fn test_domain_error_codes() {
        let err = DomainError::ProductNotFound {
            product_id: ProductId::new(1),
        };
        assert_eq!(err.code(), "product_not_found");

        let err = DomainError::InvalidOrderOperation {
            order_id: OrderId::new(4),
            reason: "already completed".to_string(),
        };
        assert_eq!(err.code(), "invalid_order_operation");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::Domain(DomainError::ProductNotFound {
                product_id: ProductId::new(1),
            })),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Domain(DomainError::InvalidQuantity {
                product_id: ProductId::new(1),
                requested: 3,
                min_order_qty: 5,
                order_increment: 1,
            })),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Domain(DomainError::InsufficientStock {
                product_id: ProductId::new(1),
                requested: 10,
                available: 2,
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Unauthorized("no token".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Internal("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_body_carries_violation_fields() {
        let err = AppError::Domain(DomainError::InvalidQuantity {
            product_id: ProductId::new(9),
            requested: 7,
            min_order_qty: 10,
            order_increment: 5,
        });
        let body = err.body();

        assert_eq!(body["error"]["code"], "invalid_quantity");
        assert_eq!(body["error"]["product_id"], 9);
        assert_eq!(body["error"]["requested"], 7);
        assert_eq!(body["error"]["min_order_qty"], 10);
        assert_eq!(body["error"]["order_increment"], 5);
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let err = AppError::Internal("connection pool exhausted".to_string());
        let body = err.body();

        assert_eq!(body["error"]["code"], "internal_error");
        assert_eq!(body["error"]["message"], "Internal server error");
    }
}
