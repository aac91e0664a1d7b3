/// Unauthenticated endpoints: share links, raw files, health, theming
use crate::{
    assets::AssetView,
    context::AppContext,
    error::{HostError, HostResult},
    storage,
};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/settings", get(public_settings))
        .route("/public/images/:id", get(get_public_image))
        .route("/public/images/:id", delete(delete_by_token))
        .route("/uploads/:filename", get(serve_file))
}

/// GET /health
async fn health(State(ctx): State<AppContext>) -> HostResult<Json<serde_json::Value>> {
    crate::db::test_connection(&ctx.db).await?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "version": ctx.config.service.version,
    })))
}

/// GET /metrics
async fn metrics() -> String {
    crate::metrics::render_metrics()
}

/// GET /settings
///
/// Public theming subset; limits are included so the frontend can
/// show them before an upload attempt.
async fn public_settings(State(ctx): State<AppContext>) -> HostResult<Json<serde_json::Value>> {
    let settings = ctx.settings.get().await?;

    Ok(Json(serde_json::json!({
        "theme": settings.theme,
        "primaryColor": settings.primary_color,
        "enableAnimations": settings.enable_animations,
        "homepageTitle": settings.homepage_title,
        "homepageSubtitle": settings.homepage_subtitle,
        "maxUploadSizeFree": settings.max_upload_size_free,
        "maxUploadSizePremium": settings.max_upload_size_premium,
        "subscriptionPrice": settings.subscription_price,
        "maintenanceMode": settings.maintenance_mode,
    })))
}

/// GET /public/images/:id
///
/// Share-link metadata. Each fetch counts as a view.
async fn get_public_image(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> HostResult<Json<serde_json::Value>> {
    let asset = ctx.asset_store.get_public(&id).await?;
    let uploader = ctx.user_manager.get_user(&asset.user_id).await?;

    Ok(Json(serde_json::json!({
        "image": AssetView::from(asset),
        "uploader": {
            "name": uploader.name,
            "email": uploader.email,
        },
    })))
}

#[derive(Debug, Deserialize)]
struct DeleteTokenQuery {
    token: String,
}

/// DELETE /public/images/:id?token=...
async fn delete_by_token(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(query): Query<DeleteTokenQuery>,
) -> HostResult<Json<serde_json::Value>> {
    ctx.asset_store.delete_by_token(&id, &query.token).await?;
    Ok(Json(serde_json::json!({ "message": "Image deleted" })))
}

/// GET /uploads/:filename
///
/// Raw file bytes. MIME type comes from the asset row when one matches
/// the filename; thumbnails fall back to their original's type.
async fn serve_file(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
) -> HostResult<impl IntoResponse> {
    storage::validate_filename(&filename)?;

    let data = ctx
        .asset_store
        .backend()
        .get(&filename)
        .await?
        .ok_or_else(|| HostError::NotFound("File not found".to_string()))?;

    let lookup_name = filename.strip_prefix("thumb_").unwrap_or(&filename);
    let mime_type: Option<String> =
        sqlx::query_scalar("SELECT mime_type FROM asset WHERE filename = ?1")
            .bind(lookup_name)
            .fetch_optional(&ctx.db)
            .await
            .map_err(HostError::Database)?;

    let content_type = mime_type.unwrap_or_else(|| "application/octet-stream".to_string());

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CACHE_CONTROL,
                "public, max-age=31536000, immutable".to_string(),
            ),
        ],
        data,
    ))
}
