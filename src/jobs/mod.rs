use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::expired_session_cleanup_job(Arc::clone(&self)));
        tokio::spawn(Self::orphan_sweep_job(Arc::clone(&self)));
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Cleanup expired sessions (runs every hour)
    async fn expired_session_cleanup_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(3600));

        loop {
            interval.tick().await;
            info!("Running expired session cleanup");

            let started = std::time::Instant::now();
            match tasks::cleanup_expired_sessions(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!(
                            "Cleaned up {} expired tokens (sessions + refresh tokens)",
                            count
                        );
                    }
                    crate::metrics::record_background_job(
                        "session_cleanup",
                        "success",
                        started.elapsed().as_secs_f64(),
                    );
                }
                Err(e) => {
                    error!("Failed to cleanup expired sessions: {}", e);
                    crate::metrics::record_background_job(
                        "session_cleanup",
                        "failure",
                        started.elapsed().as_secs_f64(),
                    );
                }
            }
        }
    }

    /// Delete stored files no asset row references (runs every 24 hours)
    async fn orphan_sweep_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(86400));

        loop {
            interval.tick().await;
            info!("Running orphaned file sweep");

            let started = std::time::Instant::now();
            match tasks::sweep_orphaned_files(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Removed {} orphaned files", count);
                    }
                    crate::metrics::record_background_job(
                        "orphan_sweep",
                        "success",
                        started.elapsed().as_secs_f64(),
                    );
                }
                Err(e) => {
                    error!("Orphaned file sweep failed: {}", e);
                    crate::metrics::record_background_job(
                        "orphan_sweep",
                        "failure",
                        started.elapsed().as_secs_f64(),
                    );
                }
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;

            if let Err(e) = tasks::health_check(&scheduler.context).await {
                error!("Health check failed: {}", e);
            }
        }
    }
}
