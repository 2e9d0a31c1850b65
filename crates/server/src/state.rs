//! Application state shared across handlers.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use green_grocer_core::ProductId;

use crate::config::ServerConfig;
use crate::models::pricing::PriceTier;
use crate::models::product::Product;
use crate::notify::{NotifyError, WhatsAppClient};

/// How long catalog responses stay cached.
const CATALOG_CACHE_TTL: Duration = Duration::from_secs(300);

/// Maximum cached catalog entries.
const CATALOG_CACHE_CAPACITY: u64 = 1000;

/// Cached value types for the public catalog read path.
#[derive(Debug, Clone)]
pub enum CatalogEntry {
    /// The active-product listing, with the set of products that carry
    /// quantity tiers.
    List {
        /// Active products, name order.
        products: Arc<Vec<Product>>,
        /// Products that have at least one quantity tier.
        tiered: Arc<HashSet<ProductId>>,
    },
    /// A single product with its quantity tiers.
    Detail {
        /// The product.
        product: Box<Product>,
        /// Its quantity-discount tiers.
        tiers: Arc<Vec<PriceTier>>,
    },
}

/// One mutex per scheduled job so a job never runs concurrently with itself.
#[derive(Debug, Default)]
pub struct JobLocks {
    /// Guards the orphaned-order cleanup job.
    pub cleanup_orphaned: Mutex<()>,
    /// Guards the inventory reconciliation job.
    pub sync_inventory: Mutex<()>,
    /// Guards the batch expiry job.
    pub update_expiry: Mutex<()>,
    /// Guards the notification dispatch job.
    pub dispatch_notifications: Mutex<()>,
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; provides access to the database pool,
/// configuration, the WhatsApp gateway client, and the catalog cache.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: SqlitePool,
    whatsapp: Option<WhatsAppClient>,
    catalog_cache: Cache<String, CatalogEntry>,
    jobs: JobLocks,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the WhatsApp gateway client cannot be built from
    /// the configured credentials.
    pub fn new(config: ServerConfig, pool: SqlitePool) -> Result<Self, NotifyError> {
        let whatsapp = match &config.whatsapp {
            Some(gateway_config) => Some(WhatsAppClient::new(gateway_config)?),
            None => None,
        };

        let catalog_cache = Cache::builder()
            .max_capacity(CATALOG_CACHE_CAPACITY)
            .time_to_live(CATALOG_CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                whatsapp,
                catalog_cache,
                jobs: JobLocks::default(),
            }),
        })
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    /// Get a reference to the WhatsApp gateway client, when configured.
    #[must_use]
    pub fn whatsapp(&self) -> Option<&WhatsAppClient> {
        self.inner.whatsapp.as_ref()
    }

    /// Get a reference to the catalog response cache.
    #[must_use]
    pub fn catalog_cache(&self) -> &Cache<String, CatalogEntry> {
        &self.inner.catalog_cache
    }

    /// Get a reference to the per-job run locks.
    #[must_use]
    pub fn jobs(&self) -> &JobLocks {
        &self.inner.jobs
    }

    /// Drop all cached catalog entries. Called after staff catalog mutations
    /// so stale prices and stock never outlive an edit by more than a request.
    pub fn invalidate_catalog(&self) {
        self.inner.catalog_cache.invalidate_all();
    }
}
