//! Seed the database with demo data.
//!
//! Creates a small wholesale catalog (brands, categories, products with
//! volume tiers and opening batches), the loyalty tier ladder, and two users
//! whose API tokens are printed once. Refuses to run against a database that
//! already has users.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use green_grocer_core::{Money, Phone, UserRole};
use green_grocer_server::db::{
    self, LoyaltyRepository, PricingRepository, ProductRepository, UserRepository,
};
use green_grocer_server::middleware::generate_api_token;
use green_grocer_server::models::loyalty::CreateLoyaltyTierInput;
use green_grocer_server::models::pricing::{CreatePriceListInput, CreatePriceTierInput};
use green_grocer_server::models::product::{CreateBatchInput, CreateProductInput};
use green_grocer_server::models::user::CreateUserInput;
use green_grocer_server::services::StockService;

/// Seed demo data into an empty database.
///
/// # Errors
///
/// Returns an error if the environment is missing the database path, the
/// database already contains users, or any insert fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let database_path = std::env::var("GROCER_DATABASE_PATH")
        .or_else(|_| std::env::var("DATABASE_PATH"))
        .map_err(|_| "GROCER_DATABASE_PATH not set")?;

    let pool = db::create_pool(&database_path).await?;

    let users = UserRepository::new(&pool);
    if !users.list().await?.is_empty() {
        return Err("database already has users; refusing to seed".into());
    }

    let now = Utc::now();

    info!("Seeding loyalty tiers...");
    let loyalty = LoyaltyRepository::new(&pool);
    for (name, min_spend, discount_bps, point_multiplier_bps, free_shipping) in [
        ("Bronze", 0, 0, 10, false),
        ("Silver", 5_000_000, 200, 12, false),
        ("Gold", 20_000_000, 500, 15, true),
    ] {
        loyalty
            .create_tier(
                &CreateLoyaltyTierInput {
                    name: name.to_owned(),
                    min_spend: Money::from_minor(min_spend),
                    discount_bps,
                    point_multiplier_bps,
                    free_shipping,
                },
                now,
            )
            .await?;
    }

    info!("Seeding catalog...");
    let products = ProductRepository::new(&pool);
    let sunrise = products
        .create_brand("Sunrise Mills", "sunrise-mills", now)
        .await?;
    let himalaya = products
        .create_brand("Himalaya Foods", "himalaya-foods", now)
        .await?;

    let grains = products
        .create_category("Grains & Rice", "grains-rice", now)
        .await?;
    let oils = products
        .create_category("Cooking Oils & Ghee", "cooking-oils-ghee", now)
        .await?;
    let beverages = products
        .create_category("Beverages", "beverages", now)
        .await?;

    let rice = products
        .create(
            &CreateProductInput {
                sku: "RICE-25KG".to_owned(),
                slug: "basmati-rice-25kg".to_owned(),
                name: "Basmati Rice 25kg".to_owned(),
                base_price: Money::from_minor(450_000),
                stock: 0,
                min_order_qty: 5,
                order_increment: 5,
                brand_id: Some(sunrise.id),
                category_id: Some(grains.id),
                is_active: true,
                is_featured: true,
            },
            now,
        )
        .await?;

    products
        .create(
            &CreateProductInput {
                sku: "ATTA-10KG".to_owned(),
                slug: "whole-wheat-atta-10kg".to_owned(),
                name: "Whole Wheat Atta 10kg".to_owned(),
                base_price: Money::from_minor(120_000),
                stock: 600,
                min_order_qty: 10,
                order_increment: 10,
                brand_id: Some(sunrise.id),
                category_id: Some(grains.id),
                is_active: true,
                is_featured: false,
            },
            now,
        )
        .await?;

    let oil = products
        .create(
            &CreateProductInput {
                sku: "OIL-5L".to_owned(),
                slug: "sunflower-oil-5l".to_owned(),
                name: "Sunflower Oil 5L".to_owned(),
                base_price: Money::from_minor(250_000),
                stock: 0,
                min_order_qty: 4,
                order_increment: 4,
                brand_id: Some(himalaya.id),
                category_id: Some(oils.id),
                is_active: true,
                is_featured: false,
            },
            now,
        )
        .await?;

    products
        .create(
            &CreateProductInput {
                sku: "GHEE-1KG".to_owned(),
                slug: "desi-ghee-1kg".to_owned(),
                name: "Desi Ghee 1kg".to_owned(),
                base_price: Money::from_minor(280_000),
                stock: 180,
                min_order_qty: 6,
                order_increment: 6,
                brand_id: Some(himalaya.id),
                category_id: Some(oils.id),
                is_active: true,
                is_featured: true,
            },
            now,
        )
        .await?;

    products
        .create(
            &CreateProductInput {
                sku: "TEA-950G".to_owned(),
                slug: "danedar-tea-950g".to_owned(),
                name: "Danedar Tea 950g".to_owned(),
                base_price: Money::from_minor(185_000),
                stock: 300,
                min_order_qty: 12,
                order_increment: 12,
                brand_id: None,
                category_id: Some(beverages.id),
                is_active: true,
                is_featured: false,
            },
            now,
        )
        .await?;

    // Perishables get their stock through dated batches so the expiry job
    // has something to track.
    info!("Receiving opening batches...");
    let stock = StockService::new(&pool);
    stock
        .receive_batch(
            rice.id,
            &CreateBatchInput {
                batch_number: "SR-2026-081".to_owned(),
                quantity: 400,
                expires_at: Some(now + Duration::days(365)),
            },
            now,
        )
        .await?;
    stock
        .receive_batch(
            oil.id,
            &CreateBatchInput {
                batch_number: "HF-2026-112".to_owned(),
                quantity: 240,
                expires_at: Some(now + Duration::days(270)),
            },
            now,
        )
        .await?;

    info!("Seeding volume price tiers...");
    let pricing = PricingRepository::new(&pool);
    pricing
        .create_tier(
            rice.id,
            &CreatePriceTierInput {
                min_quantity: 20,
                max_quantity: Some(50),
                unit_price: Some(Money::from_minor(430_000)),
                discount_bps: None,
            },
            now,
        )
        .await?;
    pricing
        .create_tier(
            rice.id,
            &CreatePriceTierInput {
                min_quantity: 50,
                max_quantity: None,
                unit_price: Some(Money::from_minor(410_000)),
                discount_bps: None,
            },
            now,
        )
        .await?;
    pricing
        .create_tier(
            oil.id,
            &CreatePriceTierInput {
                min_quantity: 24,
                max_quantity: None,
                unit_price: None,
                discount_bps: Some(800),
            },
            now,
        )
        .await?;

    info!("Seeding users...");
    let admin_token = generate_api_token();
    let admin = users
        .create(
            &CreateUserInput {
                name: "Head Office".to_owned(),
                phone: Phone::parse("+92 300 0000001")?,
                role: UserRole::Admin,
            },
            &admin_token,
            now,
        )
        .await?;

    let customer_token = generate_api_token();
    let customer = users
        .create(
            &CreateUserInput {
                name: "Karachi Mart".to_owned(),
                phone: Phone::parse("+92 300 1234567")?,
                role: UserRole::Customer,
            },
            &customer_token,
            now,
        )
        .await?;

    info!("Seeding a negotiated price list for {}...", customer.name);
    pricing
        .create_entry(
            customer.id,
            &CreatePriceListInput {
                user_id: customer.id,
                product_id: Some(rice.id),
                brand_id: None,
                category_id: None,
                custom_price: Some(Money::from_minor(435_000)),
                discount_bps: None,
                min_quantity: 10,
                valid_from: None,
                valid_until: None,
                priority: 0,
            },
            now,
        )
        .await?;

    info!("Seed complete!");
    info!("  Loyalty tiers: 3");
    info!("  Brands: 2, Categories: 3, Products: 5");
    info!("  Volume tiers: 3, Price list entries: 1");
    info!("  Users: 2");
    info!("");
    info!("API tokens (shown once):");
    info!("  {} (admin): {admin_token}", admin.name);
    info!("  {} (customer): {customer_token}", customer.name);
    warn!("Store these tokens now; they cannot be retrieved later.");

    Ok(())
}
