//! Price resolution through the order path: quantity tiers, negotiated
//! price lists, loyalty discounts, and shipping.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use green_grocer_core::{Money, ProductId};
use green_grocer_integration_tests::{TestContext, TestResponse, test_config};

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

/// A quantity tier kicks in exactly at its minimum quantity.
#[tokio::test]
async fn test_quantity_tier_applies_at_threshold() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Karachi Mart").await;
    let product = ctx.create_product("RICE-25KG", 100_000, 1_000).await;
    ctx.create_quantity_tier(product.id, 10, None, 90_000).await;

    let below = post_order(&ctx, &customer, product.id, 9).await;
    assert_eq!(below.body["items"][0]["unit_price"], 100_000);
    assert_eq!(below.body["items"][0]["price_source"], "base");
    assert_eq!(below.body["subtotal"], 900_000);

    let at = post_order(&ctx, &customer, product.id, 10).await;
    assert_eq!(at.body["items"][0]["unit_price"], 90_000);
    assert_eq!(at.body["items"][0]["price_source"], "tier");
    assert_eq!(at.body["subtotal"], 900_000);
}

/// A tier's upper bound is exclusive; the next band takes over there.
#[tokio::test]
async fn test_tier_upper_bound_is_exclusive() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Lahore Traders").await;
    let product = ctx.create_product("ATTA-10KG", 100_000, 10_000).await;
    ctx.create_quantity_tier(product.id, 10, Some(50), 90_000).await;
    ctx.create_quantity_tier(product.id, 50, None, 85_000).await;

    let in_band = post_order(&ctx, &customer, product.id, 49).await;
    assert_eq!(in_band.body["items"][0]["unit_price"], 90_000);

    let next_band = post_order(&ctx, &customer, product.id, 50).await;
    assert_eq!(next_band.body["items"][0]["unit_price"], 85_000);
}

/// A negotiated price list entry beats quantity tiers, and a customer on
/// a price list gets no loyalty discount stacked on top.
#[tokio::test]
async fn test_price_list_overrides_and_suppresses_loyalty() {
    let ctx = TestContext::new().await;
    let (customer, token) = ctx.create_customer("Karachi Mart").await;
    let (_, staff) = ctx.create_staff("Head Office").await;
    let gold = ctx.create_loyalty_tier("Gold", 0, 1_000, 15, false).await;
    ctx.assign_loyalty_tier(customer.id, &gold).await;

    let product = ctx.create_product("GHEE-1KG", 100_000, 1_000).await;
    ctx.create_quantity_tier(product.id, 10, None, 90_000).await;

    let entry = ctx
        .post(
            "/admin/price-lists",
            Some(&staff),
            Some(json!({
                "user_id": customer.id,
                "product_id": product.id,
                "custom_price": 80_000,
            })),
        )
        .await;
    assert_eq!(entry.status, StatusCode::CREATED);

    let order = post_order(&ctx, &token, product.id, 10).await;
    assert_eq!(order.body["items"][0]["unit_price"], 80_000);
    assert_eq!(order.body["items"][0]["price_source"], "price_list");
    assert_eq!(order.body["discount_amount"], 0);
    assert_eq!(order.body["total_amount"], 800_000);
}

/// Without a price list, a loyalty tier's discount comes off the order
/// subtotal while line prices stay untouched.
#[tokio::test]
async fn test_loyalty_discount_applies_at_order_level() {
    let ctx = TestContext::new().await;
    let (customer, token) = ctx.create_customer("Multan Foods").await;
    let gold = ctx.create_loyalty_tier("Gold", 0, 1_000, 15, false).await;
    ctx.assign_loyalty_tier(customer.id, &gold).await;
    let product = ctx.create_product("OIL-5L", 100_000, 1_000).await;

    let order = post_order(&ctx, &token, product.id, 10).await;
    assert_eq!(order.body["subtotal"], 1_000_000);
    assert_eq!(order.body["discount_amount"], 100_000);
    assert_eq!(order.body["total_amount"], 900_000);
    assert_eq!(order.body["items"][0]["unit_price"], 100_000);
    assert_eq!(order.body["items"][0]["price_source"], "base");
}

/// The flat shipping rate lands on every order except for customers in a
/// free-shipping tier.
#[tokio::test]
async fn test_free_shipping_tier_waives_flat_rate() {
    let mut config = test_config();
    config.shipping_flat_rate = Money::from_minor(50_000);
    let ctx = TestContext::with_config(config).await;
    let (customer, token) = ctx.create_customer("Karachi Mart").await;
    let product = ctx.create_product("RICE-25KG", 100_000, 1_000).await;

    let paying = post_order(&ctx, &token, product.id, 10).await;
    assert_eq!(paying.body["shipping_cost"], 50_000);
    assert_eq!(paying.body["total_amount"], 1_050_000);

    let gold = ctx.create_loyalty_tier("Gold", 0, 0, 15, true).await;
    ctx.assign_loyalty_tier(customer.id, &gold).await;

    let free = post_order(&ctx, &token, product.id, 10).await;
    assert_eq!(free.body["shipping_cost"], 0);
    assert_eq!(free.body["total_amount"], 1_000_000);
}

/// Expired entries are skipped and an entry's own minimum quantity gates
/// it independently of the product's rules.
#[tokio::test]
async fn test_price_list_validity_window_and_min_quantity() {
    let ctx = TestContext::new().await;
    let (customer, token) = ctx.create_customer("Quetta Mart").await;
    let (_, staff) = ctx.create_staff("Head Office").await;
    let product = ctx.create_product("TEA-950G", 100_000, 1_000).await;

    let expired = ctx
        .post(
            "/admin/price-lists",
            Some(&staff),
            Some(json!({
                "user_id": customer.id,
                "product_id": product.id,
                "custom_price": 70_000,
                "valid_until": (Utc::now() - Duration::days(1)).to_rfc3339(),
            })),
        )
        .await;
    assert_eq!(expired.status, StatusCode::CREATED);

    let base_priced = post_order(&ctx, &token, product.id, 10).await;
    assert_eq!(base_priced.body["items"][0]["price_source"], "base");

    ctx.post(
        "/admin/price-lists",
        Some(&staff),
        Some(json!({
            "user_id": customer.id,
            "product_id": product.id,
            "custom_price": 80_000,
            "min_quantity": 10,
        })),
    )
    .await;

    let small = post_order(&ctx, &token, product.id, 5).await;
    assert_eq!(small.body["items"][0]["unit_price"], 100_000);
    assert_eq!(small.body["items"][0]["price_source"], "base");

    let bulk = post_order(&ctx, &token, product.id, 10).await;
    assert_eq!(bulk.body["items"][0]["unit_price"], 80_000);
    assert_eq!(bulk.body["items"][0]["price_source"], "price_list");
}
