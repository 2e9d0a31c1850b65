//! Order route handlers.
//!
//! Who may call what is enforced here (extractors and ownership checks);
//! whether the order's state permits the operation is re-checked inside the
//! order service under its transaction.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use green_grocer_core::{OrderId, OrderStatus};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::{CurrentUser, RequireStaff};
use crate::models::order::{NewOrderLine, Order, OrderWithItems};
use crate::services::OrderService;
use crate::state::AppState;

/// Request body for placing an order.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Requested lines; must not be empty.
    pub lines: Vec<NewOrderLine>,
}

/// Query parameters for the order listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    /// Restrict the listing to one status.
    pub status: Option<OrderStatus>,
}

/// Place an order.
///
/// # Route
///
/// `POST /orders`
///
/// # Errors
///
/// Returns 400 for an empty order, 404/422/409 for pricing and stock
/// violations.
#[instrument(skip_all, fields(user_id = %user.id, lines = body.lines.len()))]
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderWithItems>)> {
    if body.lines.is_empty() {
        return Err(AppError::BadRequest(
            "order must contain at least one line".to_string(),
        ));
    }

    let service = OrderService::new(state.pool(), state.config().shipping_flat_rate);
    let created = service.create(&user, &body.lines, Utc::now()).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// List orders: staff see every order, customers their own. Both may narrow
/// by status.
///
/// # Route
///
/// `GET /orders`
///
/// # Errors
///
/// Returns an error if the listing query fails.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool());

    let listing = if user.role.is_staff() {
        orders.list(query.status).await?
    } else {
        let mut own = orders.list_for_user(user.id).await?;
        if let Some(status) = query.status {
            own.retain(|order| order.status == status);
        }
        own
    };

    Ok(Json(listing))
}

/// Show one order with its items.
///
/// # Route
///
/// `GET /orders/{id}`
///
/// # Errors
///
/// Returns 404 if the order does not exist or belongs to another customer.
#[instrument(skip_all, fields(order_id = id, user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<OrderWithItems>> {
    let order_id = OrderId::new(id);
    let orders = OrderRepository::new(state.pool());

    let order = orders
        .find_by_id(order_id)
        .await?
        // Another customer's order reads as missing, not forbidden
        .filter(|order| user.role.is_staff() || order.user_id == user.id)
        .ok_or_else(|| AppError::NotFound(format!("no order {id}")))?;

    let items = orders.items_for(order_id).await?;

    Ok(Json(OrderWithItems { order, items }))
}

/// Cancel an order. Owners may cancel while the order is pending; staff may
/// cancel any order that is not already terminal.
///
/// # Route
///
/// `POST /orders/{id}/cancel`
///
/// # Errors
///
/// Returns 404 for unknown or foreign orders, 409 when the state forbids
/// cancellation.
#[instrument(skip_all, fields(order_id = id, user_id = %user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Order>> {
    let service = OrderService::new(state.pool(), state.config().shipping_flat_rate);
    let order = service.cancel(OrderId::new(id), &user, Utc::now()).await?;

    Ok(Json(order))
}

/// Record that payment arrived for a pending order.
///
/// # Route
///
/// `POST /orders/{id}/confirm-payment`
///
/// # Errors
///
/// Returns 409 when the order or its payment is not in a confirmable state.
#[instrument(skip_all, fields(order_id = id, actor = %staff.id))]
pub async fn confirm_payment(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<i64>,
) -> Result<Json<Order>> {
    let service = OrderService::new(state.pool(), state.config().shipping_flat_rate);
    let order = service
        .confirm_payment(OrderId::new(id), &staff, Utc::now())
        .await?;

    Ok(Json(order))
}

/// Mark a processing or paid order as completed.
///
/// # Route
///
/// `POST /orders/{id}/complete`
///
/// # Errors
///
/// Returns 409 when the order's status does not allow completion.
#[instrument(skip_all, fields(order_id = id, actor = %staff.id))]
pub async fn complete(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<i64>,
) -> Result<Json<Order>> {
    let service = OrderService::new(state.pool(), state.config().shipping_flat_rate);
    let order = service
        .complete(OrderId::new(id), &staff, Utc::now())
        .await?;

    Ok(Json(order))
}
