/// Rate Limiting System
use crate::error::{HostError, HostResult};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Requests per second for authenticated users
    pub authenticated_rps: u32,
    /// Requests per second for unauthenticated traffic (public links, webhooks)
    pub unauthenticated_rps: u32,
    /// Uploads per second across the instance
    pub upload_rps: u32,
    /// Burst size
    pub burst_size: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            authenticated_rps: 100,
            unauthenticated_rps: 10,
            upload_rps: 5,
            burst_size: 50,
        }
    }
}

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    authenticated: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    unauthenticated: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    upload: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig, enabled: bool) -> Self {
        let auth_quota = Quota::per_second(
            NonZeroU32::new(config.authenticated_rps).unwrap_or(NonZeroU32::new(100).unwrap()),
        )
        .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::new(50).unwrap()));

        let unauth_quota = Quota::per_second(
            NonZeroU32::new(config.unauthenticated_rps).unwrap_or(NonZeroU32::new(10).unwrap()),
        )
        .allow_burst(
            NonZeroU32::new(config.burst_size / 5).unwrap_or(NonZeroU32::new(10).unwrap()),
        );

        let upload_quota = Quota::per_second(
            NonZeroU32::new(config.upload_rps).unwrap_or(NonZeroU32::new(5).unwrap()),
        )
        .allow_burst(NonZeroU32::new(config.upload_rps).unwrap_or(NonZeroU32::new(5).unwrap()));

        Self {
            authenticated: Arc::new(GovernorLimiter::direct(auth_quota)),
            unauthenticated: Arc::new(GovernorLimiter::direct(unauth_quota)),
            upload: Arc::new(GovernorLimiter::direct(upload_quota)),
            enabled,
        }
    }

    /// Check rate limit for authenticated requests
    pub fn check_authenticated(&self) -> HostResult<()> {
        if !self.enabled {
            return Ok(());
        }
        match self.authenticated.check() {
            Ok(_) => Ok(()),
            Err(_) => Err(HostError::RateLimitExceeded {
                retry_after: std::time::Duration::from_secs(1),
            }),
        }
    }

    /// Check rate limit for unauthenticated requests
    pub fn check_unauthenticated(&self) -> HostResult<()> {
        if !self.enabled {
            return Ok(());
        }
        match self.unauthenticated.check() {
            Ok(_) => Ok(()),
            Err(_) => Err(HostError::RateLimitExceeded {
                retry_after: std::time::Duration::from_secs(1),
            }),
        }
    }

    /// Check the stricter upload limit
    pub fn check_upload(&self) -> HostResult<()> {
        if !self.enabled {
            return Ok(());
        }
        match self.upload.check() {
            Ok(_) => Ok(()),
            Err(_) => Err(HostError::RateLimitExceeded {
                retry_after: std::time::Duration::from_secs(1),
            }),
        }
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<crate::context::AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let is_upload = request.uri().path() == "/upload";
    let has_auth_header = request.headers().get("authorization").is_some();

    let rate_limit_result = if is_upload {
        ctx.rate_limiter.check_upload()
    } else if has_auth_header {
        ctx.rate_limiter.check_authenticated()
    } else {
        ctx.rate_limiter.check_unauthenticated()
    };

    match rate_limit_result {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => Err(StatusCode::TOO_MANY_REQUESTS),
    }
}
