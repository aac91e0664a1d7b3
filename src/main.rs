/// Pixelhost - multi-tenant image and video hosting service
///
/// Accounts, quota-gated uploads, public share links, subscription
/// billing, and an admin console over SQLite and pluggable file
/// storage.

mod account;
mod api;
mod assets;
mod auth;
mod billing;
mod config;
mod context;
mod db;
mod error;
mod jobs;
mod metrics;
mod notify;
mod rate_limit;
mod server;
mod settings;
mod storage;

use config::ServerConfig;
use context::AppContext;
use error::HostResult;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> HostResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixelhost=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    config.validate()?;

    let ctx = AppContext::new(config).await?;
    let ctx = Arc::new(ctx);

    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}
