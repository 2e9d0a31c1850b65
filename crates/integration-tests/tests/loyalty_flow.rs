//! Loyalty accrual and tier progression across the payment path.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use green_grocer_core::{NotificationKind, ProductId};
use green_grocer_integration_tests::{TestContext, TestResponse};

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

async fn confirm(ctx: &TestContext, staff: &str, order_id: i64) {
    let resp = ctx
        .post(&format!("/orders/{order_id}/confirm-payment"), Some(staff), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

/// Points accrue at the rate of the tier held when payment lands, so the
/// payment that lifts a customer into their first tier earns nothing.
#[tokio::test]
async fn test_points_accrue_with_the_tier_held_at_confirmation() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Karachi Mart").await;
    let (_, staff) = ctx.create_staff("Head Office").await;
    ctx.create_loyalty_tier("Bronze", 0, 0, 10, false).await;
    let product = ctx.create_product("RICE-25KG", 25_000, 1_000).await;

    let first = post_order(&ctx, &customer, product.id, 10).await;
    confirm(&ctx, &staff, first.body["id"].as_i64().unwrap()).await;

    let me = ctx.get("/me", Some(&customer)).await;
    assert_eq!(me.body["points"], 0);
    assert_eq!(me.body["total_spend"], 250_000);
    assert_eq!(me.body["tier"]["name"], "Bronze");

    // The second payment accrues at the Bronze rate: 10 bps of 250_000.
    let second = post_order(&ctx, &customer, product.id, 10).await;
    confirm(&ctx, &staff, second.body["id"].as_i64().unwrap()).await;

    let me = ctx.get("/me", Some(&customer)).await;
    assert_eq!(me.body["points"], 250);
    assert_eq!(me.body["total_spend"], 500_000);
}

/// Each tier boundary crossed announces itself exactly once; further
/// spend inside a tier stays quiet. Accrual floors fractional points.
#[tokio::test]
async fn test_tier_upgrades_notify_exactly_once() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Lahore Traders").await;
    let (_, staff) = ctx.create_staff("Head Office").await;
    ctx.create_loyalty_tier("Bronze", 0, 0, 10, false).await;
    ctx.create_loyalty_tier("Silver", 400_000, 200, 12, false).await;
    let product = ctx.create_product("GHEE-1KG", 25_000, 10_000).await;

    // 250_000 paid lifts the customer into Bronze.
    let first = post_order(&ctx, &customer, product.id, 10).await;
    confirm(&ctx, &staff, first.body["id"].as_i64().unwrap()).await;
    assert_eq!(ctx.notification_count(NotificationKind::TierUpgrade).await, 1);

    // 500_000 total crosses into Silver.
    let second = post_order(&ctx, &customer, product.id, 10).await;
    confirm(&ctx, &staff, second.body["id"].as_i64().unwrap()).await;
    assert_eq!(ctx.notification_count(NotificationKind::TierUpgrade).await, 2);

    let me = ctx.get("/me", Some(&customer)).await;
    assert_eq!(me.body["tier"]["name"], "Silver");

    // Placed under Silver: 50_000 less the 2% tier discount leaves an
    // eligible 49_000, worth 58 points at 12 bps.
    let third = post_order(&ctx, &customer, product.id, 2).await;
    assert_eq!(third.body["discount_amount"], 1_000);
    confirm(&ctx, &staff, third.body["id"].as_i64().unwrap()).await;
    assert_eq!(ctx.notification_count(NotificationKind::TierUpgrade).await, 2);

    let me = ctx.get("/me", Some(&customer)).await;
    assert_eq!(me.body["points"], 308);
    assert_eq!(me.body["total_spend"], 549_000);
    assert_eq!(me.body["tier"]["name"], "Silver");
}

/// A fresh customer reads back with no tier and no points.
#[tokio::test]
async fn test_me_reports_no_tier_until_earned() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Peshawar Stores").await;

    let me = ctx.get("/me", Some(&customer)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["name"], "Peshawar Stores");
    assert_eq!(me.body["role"], "customer");
    assert_eq!(me.body["points"], 0);
    assert_eq!(me.body["total_spend"], 0);
    assert!(me.body["tier"].is_null());
}

/// A cancelled order can never be paid, so it never accrues points or
/// counts toward tier spend.
#[tokio::test]
async fn test_cancelled_orders_never_accrue() {
    let ctx = TestContext::new().await;
    let (customer_user, customer) = ctx.create_customer("Karachi Mart").await;
    let (_, staff) = ctx.create_staff("Head Office").await;
    let bronze = ctx.create_loyalty_tier("Bronze", 0, 0, 10, false).await;
    ctx.assign_loyalty_tier(customer_user.id, &bronze).await;
    let product = ctx.create_product("OIL-5L", 25_000, 1_000).await;

    let order = post_order(&ctx, &customer, product.id, 10).await;
    let id = order.body["id"].as_i64().unwrap();

    let cancelled = ctx
        .post(&format!("/orders/{id}/cancel"), Some(&customer), None)
        .await;
    assert_eq!(cancelled.status, StatusCode::OK);

    let confirm_attempt = ctx
        .post(&format!("/orders/{id}/confirm-payment"), Some(&staff), None)
        .await;
    assert_eq!(confirm_attempt.status, StatusCode::CONFLICT);
    assert_eq!(confirm_attempt.error_code(), "invalid_order_operation");

    let me = ctx.get("/me", Some(&customer)).await;
    assert_eq!(me.body["points"], 0);
    assert_eq!(ctx.notification_count(NotificationKind::PaymentReceived).await, 0);
}
