/// Application context, dependency injection for API handlers
use crate::{
    account::UserManager,
    assets::AssetStore,
    billing::{BillingManager, StripeClient},
    config::ServerConfig,
    notify::Notifier,
    rate_limit::{RateLimiter, RateLimiterConfig},
    settings::SettingsManager,
    storage,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared application state
///
/// Cloning is cheap; all managers sit behind Arcs.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub user_manager: Arc<UserManager>,
    pub asset_store: Arc<AssetStore>,
    pub settings: Arc<SettingsManager>,
    pub billing: Arc<BillingManager>,
    pub stripe: Arc<StripeClient>,
    pub notifier: Arc<Notifier>,
    pub rate_limiter: RateLimiter,
}

impl AppContext {
    /// Wire up all services from configuration
    pub async fn new(config: ServerConfig) -> crate::error::HostResult<Self> {
        let config = Arc::new(config);

        let pool = crate::db::create_pool(
            &config.storage.database,
            crate::db::DatabaseOptions::default(),
        )
        .await?;
        crate::db::run_migrations(&pool).await?;

        let files = storage::create_backend(&config.storage.backend).await?;

        let user_manager = Arc::new(UserManager::new(pool.clone(), config.clone()));
        let asset_store = Arc::new(AssetStore::new(
            pool.clone(),
            files,
            config.service.public_url.clone(),
        ));
        let settings = Arc::new(SettingsManager::new(pool.clone()));
        let billing = Arc::new(BillingManager::new(pool.clone()));
        let stripe = Arc::new(StripeClient::new(&config.billing));
        let notifier = Arc::new(Notifier::new(config.notifier.webhook_url.clone()));
        let rate_limiter = RateLimiter::new(RateLimiterConfig::default(), config.rate_limit.enabled);

        Ok(Self {
            config,
            db: pool,
            user_manager,
            asset_store,
            settings,
            billing,
            stripe,
            notifier,
            rate_limiter,
        })
    }
}
