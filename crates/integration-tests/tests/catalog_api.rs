//! Catalog reads, the cache in front of them, and the admin surface.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use green_grocer_integration_tests::{TestContext, product_input};

/// Liveness and readiness respond without authentication.
#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::new().await;

    let health = ctx.get("/health", None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body, "ok");

    let ready = ctx.get("/health/ready", None).await;
    assert_eq!(ready.status, StatusCode::OK);
}

/// Every other route wants a valid bearer token.
#[tokio::test]
async fn test_bearer_token_required() {
    let ctx = TestContext::new().await;

    let missing = ctx.get("/products", None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.error_code(), "unauthorized");

    let invalid = ctx.get("/me", Some("not-a-real-token")).await;
    assert_eq!(invalid.status, StatusCode::UNAUTHORIZED);
    assert_eq!(invalid.error_code(), "unauthorized");
}

/// Customers are turned away from the admin surface.
#[tokio::test]
async fn test_admin_requires_staff() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Karachi Mart").await;

    let listing = ctx.get("/admin/products", Some(&customer)).await;
    assert_eq!(listing.status, StatusCode::FORBIDDEN);
    assert_eq!(listing.error_code(), "forbidden");

    let create = ctx
        .post(
            "/admin/brands",
            Some(&customer),
            Some(json!({ "name": "Sunrise Mills", "slug": "sunrise-mills" })),
        )
        .await;
    assert_eq!(create.status, StatusCode::FORBIDDEN);
}

/// Inactive products disappear from customer reads but stay visible to
/// staff.
#[tokio::test]
async fn test_catalog_hides_inactive_products() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Karachi Mart").await;
    let (_, staff) = ctx.create_staff("Head Office").await;
    ctx.create_product("RICE-25KG", 450_000, 100).await;

    let mut hidden = product_input("TEA-950G", 185_000, 300);
    hidden.is_active = false;
    ctx.create_product_with(hidden).await;

    let listing = ctx.get("/products", Some(&customer)).await;
    let items = listing.body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["sku"], "RICE-25KG");

    let detail = ctx.get("/products/tea-950g", Some(&customer)).await;
    assert_eq!(detail.status, StatusCode::NOT_FOUND);
    assert_eq!(detail.error_code(), "not_found");

    let all = ctx.get("/admin/products", Some(&staff)).await;
    assert_eq!(all.body.as_array().unwrap().len(), 2);
}

/// The detail view lists volume tiers in ascending order and both views
/// flag which products have volume pricing.
#[tokio::test]
async fn test_product_detail_shows_quantity_tiers() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Lahore Traders").await;
    let product = ctx.create_product("RICE-25KG", 450_000, 100).await;
    ctx.create_product("ATTA-10KG", 120_000, 600).await;
    ctx.create_quantity_tier(product.id, 50, None, 410_000).await;
    ctx.create_quantity_tier(product.id, 20, Some(50), 430_000).await;

    let detail = ctx.get("/products/rice-25kg", Some(&customer)).await;
    assert_eq!(detail.status, StatusCode::OK);
    assert_eq!(detail.body["has_volume_pricing"], true);
    let tiers = detail.body["price_tiers"].as_array().unwrap();
    assert_eq!(tiers.len(), 2);
    assert_eq!(tiers[0]["min_quantity"], 20);
    assert_eq!(tiers[1]["min_quantity"], 50);

    let listing = ctx.get("/products", Some(&customer)).await;
    for item in listing.body.as_array().unwrap() {
        let expected = item["sku"] == "RICE-25KG";
        assert_eq!(item["has_volume_pricing"], expected);
    }
}

/// Tiers created and deleted over HTTP show up in the detail view right
/// away because the mutations drop the catalog cache.
#[tokio::test]
async fn test_quantity_tier_endpoints() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Karachi Mart").await;
    let (_, staff) = ctx.create_staff("Head Office").await;
    let product = ctx.create_product("RICE-25KG", 450_000, 100).await;

    let created = ctx
        .post(
            &format!("/admin/products/{}/tiers", product.id),
            Some(&staff),
            Some(json!({ "min_quantity": 20, "max_quantity": 50, "unit_price": 430_000 })),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["min_quantity"], 20);
    let tier_id = created.body["id"].as_i64().unwrap();

    let detail = ctx.get("/products/rice-25kg", Some(&customer)).await;
    assert_eq!(detail.body["has_volume_pricing"], true);
    assert_eq!(detail.body["price_tiers"].as_array().unwrap().len(), 1);

    let removed = ctx.delete(&format!("/admin/tiers/{tier_id}"), Some(&staff)).await;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);

    let detail = ctx.get("/products/rice-25kg", Some(&customer)).await;
    assert_eq!(detail.body["has_volume_pricing"], false);
    assert_eq!(detail.body["price_tiers"].as_array().unwrap().len(), 0);

    let missing = ctx.delete(&format!("/admin/tiers/{tier_id}"), Some(&staff)).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

/// Catalog reads are served from cache until an admin mutation drops it.
#[tokio::test]
async fn test_catalog_cache_staleness_and_invalidation() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Karachi Mart").await;
    let (_, staff) = ctx.create_staff("Head Office").await;
    ctx.create_product("RICE-25KG", 450_000, 100).await;

    // Prime the listing cache.
    let primed = ctx.get("/products", Some(&customer)).await;
    assert_eq!(primed.body.as_array().unwrap().len(), 1);

    // A write that bypasses the HTTP layer leaves the cache stale.
    ctx.create_product("OIL-5L", 250_000, 200).await;
    let stale = ctx.get("/products", Some(&customer)).await;
    assert_eq!(stale.body.as_array().unwrap().len(), 1);

    // A staff mutation through the API drops it.
    let created = ctx
        .post(
            "/admin/products",
            Some(&staff),
            Some(json!({
                "sku": "GHEE-1KG",
                "slug": "ghee-1kg",
                "name": "Desi Ghee 1kg",
                "base_price": 280_000,
                "stock": 180,
            })),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);

    let refreshed = ctx.get("/products", Some(&customer)).await;
    assert_eq!(refreshed.body.as_array().unwrap().len(), 3);
}

/// Product create, partial update, and delete over the admin API.
#[tokio::test]
async fn test_admin_product_crud() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Karachi Mart").await;
    let (_, staff) = ctx.create_staff("Head Office").await;

    let created = ctx
        .post(
            "/admin/products",
            Some(&staff),
            Some(json!({
                "sku": "RICE-25KG",
                "slug": "rice-25kg",
                "name": "Basmati Rice 25kg",
                "base_price": 450_000,
                "stock": 100,
            })),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.body["id"].as_i64().unwrap();

    let duplicate = ctx
        .post(
            "/admin/products",
            Some(&staff),
            Some(json!({
                "sku": "RICE-25KG",
                "slug": "rice-25kg-2",
                "name": "Duplicate",
                "base_price": 1,
            })),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.error_code(), "conflict");

    let updated = ctx
        .patch(
            &format!("/admin/products/{id}"),
            Some(&staff),
            json!({ "name": "Super Basmati 25kg", "is_active": false }),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["name"], "Super Basmati 25kg");
    assert_eq!(updated.body["is_active"], false);
    // Untouched fields survive a partial update.
    assert_eq!(updated.body["base_price"], 450_000);

    let listing = ctx.get("/products", Some(&customer)).await;
    assert_eq!(listing.body.as_array().unwrap().len(), 0);

    let deleted = ctx.delete(&format!("/admin/products/{id}"), Some(&staff)).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let gone = ctx
        .patch(
            &format!("/admin/products/{id}"),
            Some(&staff),
            json!({ "name": "x" }),
        )
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

/// Brands and categories: create, list, and slug uniqueness.
#[tokio::test]
async fn test_admin_taxonomy() {
    let ctx = TestContext::new().await;
    let (_, staff) = ctx.create_staff("Head Office").await;

    let brand = ctx
        .post(
            "/admin/brands",
            Some(&staff),
            Some(json!({ "name": "Sunrise Mills", "slug": "sunrise-mills" })),
        )
        .await;
    assert_eq!(brand.status, StatusCode::CREATED);

    let brands = ctx.get("/admin/brands", Some(&staff)).await;
    assert_eq!(brands.body.as_array().unwrap().len(), 1);
    assert_eq!(brands.body[0]["name"], "Sunrise Mills");

    let duplicate = ctx
        .post(
            "/admin/brands",
            Some(&staff),
            Some(json!({ "name": "Sunrise Mills Ltd", "slug": "sunrise-mills" })),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let category = ctx
        .post(
            "/admin/categories",
            Some(&staff),
            Some(json!({ "name": "Grains & Rice", "slug": "grains-rice" })),
        )
        .await;
    assert_eq!(category.status, StatusCode::CREATED);

    let categories = ctx.get("/admin/categories", Some(&staff)).await;
    assert_eq!(categories.body.as_array().unwrap().len(), 1);
}

/// Price list entries can be created, listed per customer, and removed.
#[tokio::test]
async fn test_admin_price_list_management() {
    let ctx = TestContext::new().await;
    let (customer, _) = ctx.create_customer("Karachi Mart").await;
    let (_, staff) = ctx.create_staff("Head Office").await;
    let product = ctx.create_product("RICE-25KG", 450_000, 100).await;

    let entry = ctx
        .post(
            "/admin/price-lists",
            Some(&staff),
            Some(json!({
                "user_id": customer.id,
                "product_id": product.id,
                "custom_price": 435_000,
                "min_quantity": 10,
            })),
        )
        .await;
    assert_eq!(entry.status, StatusCode::CREATED);
    let entry_id = entry.body["id"].as_i64().unwrap();

    let listed = ctx
        .get(&format!("/admin/users/{}/price-lists", customer.id), Some(&staff))
        .await;
    assert_eq!(listed.body.as_array().unwrap().len(), 1);
    assert_eq!(listed.body[0]["custom_price"], 435_000);

    let removed = ctx
        .delete(&format!("/admin/price-lists/{entry_id}"), Some(&staff))
        .await;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);

    let empty = ctx
        .get(&format!("/admin/users/{}/price-lists", customer.id), Some(&staff))
        .await;
    assert_eq!(empty.body.as_array().unwrap().len(), 0);

    let missing = ctx
        .delete(&format!("/admin/price-lists/{entry_id}"), Some(&staff))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

/// Loyalty tiers can be created and their names are unique.
#[tokio::test]
async fn test_admin_loyalty_tier_creation() {
    let ctx = TestContext::new().await;
    let (_, staff) = ctx.create_staff("Head Office").await;

    let tier = ctx
        .post(
            "/admin/loyalty-tiers",
            Some(&staff),
            Some(json!({
                "name": "Silver",
                "min_spend": 5_000_000,
                "discount_bps": 200,
                "point_multiplier_bps": 12,
            })),
        )
        .await;
    assert_eq!(tier.status, StatusCode::CREATED);
    assert_eq!(tier.body["free_shipping"], false);

    let duplicate = ctx
        .post(
            "/admin/loyalty-tiers",
            Some(&staff),
            Some(json!({ "name": "Silver", "min_spend": 1 })),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.error_code(), "conflict");
}
