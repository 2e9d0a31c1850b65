//! Order lifecycle over HTTP: placement, payment, completion,
//! cancellation, and the ownership rules around each.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use green_grocer_core::{NotificationKind, ProductId};
use green_grocer_integration_tests::{TestContext, TestResponse, product_input};
use green_grocer_server::db::AuditRepository;

async fn post_order(
    ctx: &TestContext,
    token: &str,
    product_id: ProductId,
    quantity: i64,
) -> TestResponse {
    ctx.post(
        "/orders",
        Some(token),
        Some(json!({ "lines": [{ "product_id": product_id, "quantity": quantity }] })),
    )
    .await
}

/// An order moves pending -> processing -> completed, reserving stock on
/// placement and queueing a notification at every step.
#[tokio::test]
async fn test_order_lifecycle_happy_path() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Karachi Mart").await;
    let (_, staff) = ctx.create_staff("Head Office").await;
    let product = ctx.create_product("RICE-25KG", 450_000, 100).await;

    let created = post_order(&ctx, &customer, product.id, 10).await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["status"], "pending");
    assert_eq!(created.body["payment_status"], "pending");
    assert_eq!(created.body["subtotal"], 4_500_000);
    assert_eq!(created.body["discount_amount"], 0);
    assert_eq!(created.body["shipping_cost"], 0);
    assert_eq!(created.body["total_amount"], 4_500_000);
    assert!(created.body["order_number"].as_str().unwrap().starts_with("GG-"));

    let item = &created.body["items"][0];
    assert_eq!(item["sku"], "RICE-25KG");
    assert_eq!(item["quantity"], 10);
    assert_eq!(item["unit_price"], 450_000);
    assert_eq!(item["line_total"], 4_500_000);
    assert_eq!(item["price_source"], "base");

    assert_eq!(ctx.product_stock(product.id).await, 90);
    assert_eq!(ctx.notification_count(NotificationKind::OrderConfirmation).await, 1);

    let id = created.body["id"].as_i64().unwrap();

    // Payment confirmation is a staff operation.
    let denied = ctx
        .post(&format!("/orders/{id}/confirm-payment"), Some(&customer), None)
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let paid = ctx
        .post(&format!("/orders/{id}/confirm-payment"), Some(&staff), None)
        .await;
    assert_eq!(paid.status, StatusCode::OK);
    assert_eq!(paid.body["status"], "processing");
    assert_eq!(paid.body["payment_status"], "paid");
    assert_eq!(ctx.notification_count(NotificationKind::PaymentReceived).await, 1);

    let completed = ctx
        .post(&format!("/orders/{id}/complete"), Some(&staff), None)
        .await;
    assert_eq!(completed.status, StatusCode::OK);
    assert_eq!(completed.body["status"], "completed");
    assert_eq!(ctx.notification_count(NotificationKind::OrderCompleted).await, 1);

    let shown = ctx.get(&format!("/orders/{id}"), Some(&customer)).await;
    assert_eq!(shown.status, StatusCode::OK);
    assert_eq!(shown.body["status"], "completed");
    assert_eq!(shown.body["items"].as_array().unwrap().len(), 1);
}

/// Every lifecycle step leaves an audit entry with its field-level diff
/// and the acting user, newest first.
#[tokio::test]
async fn test_order_lifecycle_writes_audit_trail() {
    let ctx = TestContext::new().await;
    let (customer_user, customer) = ctx.create_customer("Sialkot Stores").await;
    let (staff_user, staff) = ctx.create_staff("Head Office").await;
    let product = ctx.create_product("TEA-950G", 185_000, 200).await;

    let created = post_order(&ctx, &customer, product.id, 12).await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.body["id"].as_i64().unwrap();

    ctx.post(&format!("/orders/{id}/confirm-payment"), Some(&staff), None)
        .await;
    ctx.post(&format!("/orders/{id}/complete"), Some(&staff), None)
        .await;

    let entries = AuditRepository::new(ctx.pool())
        .recent_for("order", id, 10)
        .await
        .unwrap();

    let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, ["completed", "confirm_payment", "created"]);

    assert_eq!(entries[2].actor_user_id, Some(customer_user.id));
    assert_eq!(entries[0].actor_user_id, Some(staff_user.id));

    let payment = entries[1].changes.get("payment_status").unwrap();
    assert_eq!(payment.from, json!("pending"));
    assert_eq!(payment.to, json!("paid"));
}

/// Quantities below the minimum or off the increment are rejected before
/// anything is reserved.
#[tokio::test]
async fn test_order_rejects_quantity_rules() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Lahore Traders").await;

    let mut input = product_input("ATTA-10KG", 120_000, 600);
    input.min_order_qty = 5;
    input.order_increment = 5;
    let product = ctx.create_product_with(input).await;

    let below = post_order(&ctx, &customer, product.id, 3).await;
    assert_eq!(below.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(below.error_code(), "invalid_quantity");
    assert_eq!(below.body["error"]["min_order_qty"], 5);
    assert_eq!(below.body["error"]["order_increment"], 5);

    let off_increment = post_order(&ctx, &customer, product.id, 7).await;
    assert_eq!(off_increment.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(off_increment.error_code(), "invalid_quantity");

    assert_eq!(ctx.product_stock(product.id).await, 600);

    let accepted = post_order(&ctx, &customer, product.id, 10).await;
    assert_eq!(accepted.status, StatusCode::CREATED);
}

/// A shortfall on any line rolls the whole order back, including
/// reservations already taken for earlier lines.
#[tokio::test]
async fn test_insufficient_stock_rolls_back_the_whole_order() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Multan Foods").await;
    let plenty = ctx.create_product("GHEE-1KG", 280_000, 180).await;
    let scarce = ctx.create_product("OIL-5L", 250_000, 8).await;

    let resp = ctx
        .post(
            "/orders",
            Some(&customer),
            Some(json!({
                "lines": [
                    { "product_id": plenty.id, "quantity": 6 },
                    { "product_id": scarce.id, "quantity": 10 },
                ]
            })),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_code(), "insufficient_stock");
    assert_eq!(resp.body["error"]["requested"], 10);
    assert_eq!(resp.body["error"]["available"], 8);

    assert_eq!(ctx.product_stock(plenty.id).await, 180);
    assert_eq!(ctx.product_stock(scarce.id).await, 8);
    assert_eq!(ctx.notification_count(NotificationKind::OrderConfirmation).await, 0);

    let listing = ctx.get("/orders", Some(&customer)).await;
    assert_eq!(listing.body.as_array().unwrap().len(), 0);
}

/// Unknown and inactive products read the same from the outside.
#[tokio::test]
async fn test_order_unknown_or_inactive_product_not_found() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Quetta Mart").await;

    let mut hidden = product_input("TEA-950G", 185_000, 300);
    hidden.is_active = false;
    let product = ctx.create_product_with(hidden).await;

    let inactive = post_order(&ctx, &customer, product.id, 1).await;
    assert_eq!(inactive.status, StatusCode::NOT_FOUND);
    assert_eq!(inactive.error_code(), "product_not_found");

    let missing = ctx
        .post(
            "/orders",
            Some(&customer),
            Some(json!({ "lines": [{ "product_id": 9_999, "quantity": 1 }] })),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.error_code(), "product_not_found");
}

/// An order with no lines is malformed.
#[tokio::test]
async fn test_order_with_no_lines_is_bad_request() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Sialkot Stores").await;

    let resp = ctx
        .post("/orders", Some(&customer), Some(json!({ "lines": [] })))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_code(), "bad_request");
}

/// Cancelling returns the reserved stock; a second cancel has nothing
/// left to release.
#[tokio::test]
async fn test_cancel_restores_stock() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Karachi Mart").await;
    let product = ctx.create_product("RICE-25KG", 450_000, 100).await;

    let created = post_order(&ctx, &customer, product.id, 20).await;
    let id = created.body["id"].as_i64().unwrap();
    assert_eq!(ctx.product_stock(product.id).await, 80);

    let cancelled = ctx
        .post(&format!("/orders/{id}/cancel"), Some(&customer), None)
        .await;
    assert_eq!(cancelled.status, StatusCode::OK);
    assert_eq!(cancelled.body["status"], "cancelled");
    assert_eq!(ctx.product_stock(product.id).await, 100);
    assert_eq!(ctx.notification_count(NotificationKind::OrderCancelled).await, 1);

    let again = ctx
        .post(&format!("/orders/{id}/cancel"), Some(&customer), None)
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
    assert_eq!(again.error_code(), "invalid_order_operation");
    assert_eq!(ctx.product_stock(product.id).await, 100);
}

/// Customers cannot see or cancel other customers' orders; staff can do
/// both.
#[tokio::test]
async fn test_foreign_orders_read_as_missing() {
    let ctx = TestContext::new().await;
    let (_, alice) = ctx.create_customer("Alpha Stores").await;
    let (_, bob) = ctx.create_customer("Bravo Stores").await;
    let (_, staff) = ctx.create_staff("Head Office").await;
    let product = ctx.create_product("OIL-5L", 250_000, 100).await;

    let created = post_order(&ctx, &alice, product.id, 4).await;
    let id = created.body["id"].as_i64().unwrap();

    let shown = ctx.get(&format!("/orders/{id}"), Some(&bob)).await;
    assert_eq!(shown.status, StatusCode::NOT_FOUND);
    assert_eq!(shown.error_code(), "not_found");

    let cancelled = ctx
        .post(&format!("/orders/{id}/cancel"), Some(&bob), None)
        .await;
    assert_eq!(cancelled.status, StatusCode::NOT_FOUND);

    let staff_view = ctx.get(&format!("/orders/{id}"), Some(&staff)).await;
    assert_eq!(staff_view.status, StatusCode::OK);

    let staff_cancel = ctx
        .post(&format!("/orders/{id}/cancel"), Some(&staff), None)
        .await;
    assert_eq!(staff_cancel.status, StatusCode::OK);
}

/// Payment can only be confirmed once.
#[tokio::test]
async fn test_confirm_payment_is_single_shot() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Karachi Mart").await;
    let (_, staff) = ctx.create_staff("Head Office").await;
    let product = ctx.create_product("GHEE-1KG", 280_000, 50).await;

    let created = post_order(&ctx, &customer, product.id, 2).await;
    let id = created.body["id"].as_i64().unwrap();

    let first = ctx
        .post(&format!("/orders/{id}/confirm-payment"), Some(&staff), None)
        .await;
    assert_eq!(first.status, StatusCode::OK);

    let second = ctx
        .post(&format!("/orders/{id}/confirm-payment"), Some(&staff), None)
        .await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert_eq!(second.error_code(), "invalid_order_operation");
    assert_eq!(ctx.notification_count(NotificationKind::PaymentReceived).await, 1);
}

/// Listings are scoped to the caller, staff see everything, and the
/// status filter composes with the scope.
#[tokio::test]
async fn test_order_listing_scoped_by_role() {
    let ctx = TestContext::new().await;
    let (_, alice) = ctx.create_customer("Alpha Stores").await;
    let (_, bob) = ctx.create_customer("Bravo Stores").await;
    let (_, staff) = ctx.create_staff("Head Office").await;
    let product = ctx.create_product("ATTA-10KG", 120_000, 1_000).await;

    post_order(&ctx, &alice, product.id, 10).await;
    post_order(&ctx, &alice, product.id, 10).await;
    let bobs = post_order(&ctx, &bob, product.id, 10).await;
    let bob_order = bobs.body["id"].as_i64().unwrap();

    let alice_orders = ctx.get("/orders", Some(&alice)).await;
    assert_eq!(alice_orders.body.as_array().unwrap().len(), 2);
    let bob_orders = ctx.get("/orders", Some(&bob)).await;
    assert_eq!(bob_orders.body.as_array().unwrap().len(), 1);
    let all_orders = ctx.get("/orders", Some(&staff)).await;
    assert_eq!(all_orders.body.as_array().unwrap().len(), 3);

    ctx.post(&format!("/orders/{bob_order}/cancel"), Some(&bob), None)
        .await;

    let pending = ctx.get("/orders?status=pending", Some(&staff)).await;
    assert_eq!(pending.body.as_array().unwrap().len(), 2);
    let bob_pending = ctx.get("/orders?status=pending", Some(&bob)).await;
    assert_eq!(bob_pending.body.as_array().unwrap().len(), 0);
    let bob_cancelled = ctx.get("/orders?status=cancelled", Some(&bob)).await;
    assert_eq!(bob_cancelled.body.as_array().unwrap().len(), 1);
}
