/// HTTP server setup and routing
use crate::{
    api::middleware::{maintenance_gate, metrics_middleware},
    context::AppContext,
    error::{HostError, HostResult},
    rate_limit::rate_limit_middleware,
};
use axum::{
    http::{header, Method, StatusCode},
    middleware,
    response::Json,
    Router,
};
use serde_json::json;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
/// Returns Router<()> because state is already provided
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .merge(crate::api::routes())
        .with_state(ctx.clone())
        .layer(middleware::from_fn_with_state(ctx.clone(), maintenance_gate))
        .layer(middleware::from_fn_with_state(ctx, rate_limit_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .fallback(not_found)
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> HostResult<()> {
    let addr = format!(
        "{}:{}",
        ctx.config.service.hostname, ctx.config.service.port
    );

    info!("Pixelhost listening on {}", addr);
    info!("   Public URL: {}", ctx.config.service.public_url);

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| HostError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| HostError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::UserManager;
    use crate::assets::AssetStore;
    use crate::billing::{BillingManager, StripeClient};
    use crate::config::{
        AuthConfig, BillingConfig, LimitConfig, LoggingConfig, NotifierConfig, RateLimitConfig,
        ServerConfig, ServiceConfig, StorageBackendConfig, StorageConfig,
    };
    use crate::notify::Notifier;
    use crate::rate_limit::{RateLimiter, RateLimiterConfig};
    use crate::settings::{SettingsManager, SettingsUpdate};
    use crate::storage::DiskFileBackend;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn test_context(dir: &TempDir) -> AppContext {
        let config = Arc::new(ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 0,
                version: "test".to_string(),
                public_url: "http://localhost".to_string(),
            },
            storage: StorageConfig {
                data_directory: dir.path().to_path_buf(),
                database: ":memory:".into(),
                backend: StorageBackendConfig::Disk {
                    location: dir.path().join("uploads"),
                },
            },
            authentication: AuthConfig {
                jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
            },
            limits: LimitConfig {
                free_storage_limit: 500 * 1024 * 1024,
                premium_storage_limit: 25600 * 1024 * 1024,
                free_max_file_size: 5 * 1024 * 1024,
                premium_max_file_size: 100 * 1024 * 1024,
            },
            billing: BillingConfig {
                secret_key: None,
                webhook_secret: None,
                price_id: None,
            },
            notifier: NotifierConfig { webhook_url: None },
            rate_limit: RateLimitConfig { enabled: false },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        });

        let pool = crate::db::test_pool().await;
        let files = Arc::new(DiskFileBackend::new(dir.path().join("uploads")));

        AppContext {
            user_manager: Arc::new(UserManager::new(pool.clone(), config.clone())),
            asset_store: Arc::new(AssetStore::new(
                pool.clone(),
                files,
                config.service.public_url.clone(),
            )),
            settings: Arc::new(SettingsManager::new(pool.clone())),
            billing: Arc::new(BillingManager::new(pool.clone())),
            stripe: Arc::new(StripeClient::new(&config.billing)),
            notifier: Arc::new(Notifier::new(None)),
            rate_limiter: RateLimiter::new(RateLimiterConfig::default(), false),
            db: pool,
            config,
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = TempDir::new().unwrap();
        let app = build_router(test_context(&dir).await);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_returns_404() {
        let dir = TempDir::new().unwrap();
        let app = build_router(test_context(&dir).await);

        let response = app
            .oneshot(Request::get("/no-such-route").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_signup_returns_created() {
        let dir = TempDir::new().unwrap();
        let app = build_router(test_context(&dir).await);

        let body = serde_json::json!({
            "name": "Alice",
            "email": "alice@example.com",
            "password": "correct-horse"
        });
        let response = app
            .oneshot(
                Request::post("/signup")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_admin_routes_reject_non_admin_sessions() {
        let dir = TempDir::new().unwrap();
        let ctx = test_context(&dir).await;

        let user = ctx
            .user_manager
            .signup("Bob", "bob@example.com", "correct-horse")
            .await
            .unwrap();
        let session = ctx.user_manager.create_session(&user.id).await.unwrap();
        let bearer = format!("Bearer {}", session.access_token);

        let app = build_router(ctx);

        for (method, path) in [
            ("GET", "/admin/stats"),
            ("GET", "/admin/users"),
            ("PATCH", "/admin/users/someone/ban"),
            ("DELETE", "/admin/users/someone"),
            ("PATCH", "/admin/images/someone"),
            ("PATCH", "/admin/settings"),
        ] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(path)
                        .header("authorization", &bearer)
                        .header("content-type", "application/json")
                        .body(Body::from("{}"))
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(
                response.status(),
                StatusCode::FORBIDDEN,
                "{} {} must be admin-only",
                method,
                path
            );
        }

        // No token at all is a 401
        let response = app
            .oneshot(Request::get("/admin/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_maintenance_mode_blocks_public_routes() {
        let dir = TempDir::new().unwrap();
        let ctx = test_context(&dir).await;

        ctx.settings
            .update(SettingsUpdate {
                maintenance_mode: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();

        let app = build_router(ctx);

        let blocked = app
            .clone()
            .oneshot(Request::get("/settings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(blocked.status(), StatusCode::SERVICE_UNAVAILABLE);

        // Health stays reachable so monitoring keeps working
        let health = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }
}
