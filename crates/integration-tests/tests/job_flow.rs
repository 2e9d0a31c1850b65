//! Background jobs, run directly and through the admin trigger route.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use green_grocer_core::NotificationKind;
use green_grocer_integration_tests::TestContext;
use green_grocer_server::db::NotificationRepository;
use green_grocer_server::jobs::{self, JobKind};
use green_grocer_server::models::product::CreateBatchInput;

/// Cleanup cancels stale unpaid orders and restores their stock, leaving
/// fresh and paid orders alone. A second run finds nothing.
#[tokio::test]
async fn test_cleanup_cancels_stale_unpaid_orders_once() {
    let ctx = TestContext::new().await;
    let (customer_user, customer) = ctx.create_customer("Karachi Mart").await;
    let (staff_user, _) = ctx.create_staff("Head Office").await;
    let product = ctx.create_product("RICE-25KG", 450_000, 100).await;

    let stale = ctx.place_order(&customer_user, product.id, 10).await;
    let fresh = ctx.place_order(&customer_user, product.id, 10).await;
    let paid = ctx.place_order(&customer_user, product.id, 10).await;
    ctx.order_service()
        .confirm_payment(paid.order.id, &staff_user, Utc::now())
        .await
        .unwrap();

    ctx.backdate_order(stale.order.id, 25).await;
    ctx.backdate_order(paid.order.id, 25).await;
    assert_eq!(ctx.product_stock(product.id).await, 70);

    let outcome = jobs::run(&ctx.state, JobKind::CleanupOrphaned).await.unwrap();
    assert_eq!(outcome.summary["cancelled"], 1);
    assert_eq!(ctx.product_stock(product.id).await, 80);
    assert_eq!(ctx.notification_count(NotificationKind::OrderCancelled).await, 1);

    let stale_now = ctx
        .get(&format!("/orders/{}", stale.order.id), Some(&customer))
        .await;
    assert_eq!(stale_now.body["status"], "cancelled");
    let fresh_now = ctx
        .get(&format!("/orders/{}", fresh.order.id), Some(&customer))
        .await;
    assert_eq!(fresh_now.body["status"], "pending");
    let paid_now = ctx
        .get(&format!("/orders/{}", paid.order.id), Some(&customer))
        .await;
    assert_eq!(paid_now.body["status"], "processing");

    let outcome = jobs::run(&ctx.state, JobKind::CleanupOrphaned).await.unwrap();
    assert_eq!(outcome.summary["cancelled"], 0);
    assert_eq!(ctx.product_stock(product.id).await, 80);
}

/// The expiry job flags overdue batches and realigns aggregate stock to
/// what is still sellable.
#[tokio::test]
async fn test_expiry_job_flags_batches_and_corrects_stock() {
    let ctx = TestContext::new().await;
    let product = ctx.create_product("GHEE-1KG", 280_000, 0).await;

    let stock = ctx.stock_service();
    stock
        .receive_batch(
            product.id,
            &CreateBatchInput {
                batch_number: "HB-2026-001".to_string(),
                quantity: 100,
                expires_at: Some(Utc::now() - Duration::hours(1)),
            },
            Utc::now(),
        )
        .await
        .unwrap();
    stock
        .receive_batch(
            product.id,
            &CreateBatchInput {
                batch_number: "HB-2026-002".to_string(),
                quantity: 40,
                expires_at: Some(Utc::now() + Duration::days(30)),
            },
            Utc::now(),
        )
        .await
        .unwrap();
    assert_eq!(ctx.product_stock(product.id).await, 140);

    let outcome = jobs::run(&ctx.state, JobKind::UpdateExpiry).await.unwrap();
    assert_eq!(outcome.summary["batches_expired"], 1);
    assert_eq!(outcome.summary["stock_corrected"], 1);
    assert_eq!(ctx.product_stock(product.id).await, 40);

    let outcome = jobs::run(&ctx.state, JobKind::UpdateExpiry).await.unwrap();
    assert_eq!(outcome.summary["batches_expired"], 0);
    assert_eq!(outcome.summary["stock_corrected"], 0);
}

/// Without a configured gateway the dispatcher drains the outbox by
/// logging each message and marking it sent.
#[tokio::test]
async fn test_dispatch_drains_outbox_without_gateway() {
    let ctx = TestContext::new().await;
    let (customer, _) = ctx.create_customer("Karachi Mart").await;
    let product = ctx.create_product("RICE-25KG", 450_000, 100).await;
    ctx.place_order(&customer, product.id, 10).await;

    let notifications = NotificationRepository::new(ctx.pool());
    assert_eq!(notifications.count_pending().await.unwrap(), 1);

    let outcome = jobs::run(&ctx.state, JobKind::DispatchNotifications)
        .await
        .unwrap();
    assert_eq!(outcome.summary["sent"], 1);
    assert_eq!(outcome.summary["failed"], 0);
    assert_eq!(notifications.count_pending().await.unwrap(), 0);

    let outcome = jobs::run(&ctx.state, JobKind::DispatchNotifications)
        .await
        .unwrap();
    assert_eq!(outcome.summary["sent"], 0);
}

/// The trigger route runs a job for staff, rejects unknown names, and
/// enforces auth.
#[tokio::test]
async fn test_job_trigger_route() {
    let ctx = TestContext::new().await;
    let (_, customer) = ctx.create_customer("Karachi Mart").await;
    let (_, staff) = ctx.create_staff("Head Office").await;

    let ok = ctx
        .post("/admin/jobs/cleanup_orphaned", Some(&staff), None)
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body["job"], "cleanup_orphaned");
    assert_eq!(ok.body["summary"], json!({ "cancelled": 0 }));

    let unknown = ctx
        .post("/admin/jobs/rebuild_everything", Some(&staff), None)
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.error_code(), "not_found");

    let forbidden = ctx
        .post("/admin/jobs/cleanup_orphaned", Some(&customer), None)
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let anonymous = ctx.post("/admin/jobs/cleanup_orphaned", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}

/// A job whose lock is held reports a conflict instead of running twice.
#[tokio::test]
async fn test_running_job_rejects_second_trigger() {
    let ctx = TestContext::new().await;
    let (_, staff) = ctx.create_staff("Head Office").await;

    let _guard = ctx.state.jobs().sync_inventory.try_lock().unwrap();

    let busy = ctx.post("/admin/jobs/sync_inventory", Some(&staff), None).await;
    assert_eq!(busy.status, StatusCode::CONFLICT);
    assert_eq!(busy.error_code(), "conflict");
}
