/// Admin console endpoints
///
/// All routes require an ADMIN session via the AdminUser extractor.
use crate::{
    assets::AssetView,
    auth::AdminUser,
    context::AppContext,
    db::models::Asset,
    error::{HostError, HostResult},
    settings::{SettingsUpdate, SiteSettings},
};
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/stats", get(stats))
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id/ban", patch(ban_user))
        .route("/admin/users/:id/unban", patch(unban_user))
        .route("/admin/users/:id", delete(delete_user))
        .route("/admin/images", get(list_images))
        .route("/admin/images/:id", delete(delete_image))
        .route("/admin/images/:id", patch(flag_image))
        .route("/admin/settings", get(get_settings))
        .route("/admin/settings", patch(update_settings))
}

/// Instance-wide counters for the dashboard
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminStats {
    total_users: i64,
    banned_users: i64,
    total_images: i64,
    flagged_images: i64,
    total_storage_bytes: i64,
    premium_subscriptions: i64,
    monthly_revenue: f64,
    signups_today: i64,
}

/// GET /admin/stats
async fn stats(State(ctx): State<AppContext>, _admin: AdminUser) -> HostResult<Json<AdminStats>> {
    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user")
        .fetch_one(&ctx.db)
        .await
        .map_err(HostError::Database)?;
    let banned_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user WHERE is_banned = 1")
        .fetch_one(&ctx.db)
        .await
        .map_err(HostError::Database)?;
    let total_images: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM asset")
        .fetch_one(&ctx.db)
        .await
        .map_err(HostError::Database)?;
    let flagged_images: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM asset WHERE is_flagged = 1")
        .fetch_one(&ctx.db)
        .await
        .map_err(HostError::Database)?;
    let total_storage_bytes: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(size), 0) FROM asset")
            .fetch_one(&ctx.db)
            .await
            .map_err(HostError::Database)?;
    let premium_subscriptions: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM subscription WHERE status = 'ACTIVE'")
            .fetch_one(&ctx.db)
            .await
            .map_err(HostError::Database)?;
    let signups_today: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM user WHERE created_at >= datetime('now', 'start of day')",
    )
    .fetch_one(&ctx.db)
    .await
    .map_err(HostError::Database)?;

    let settings = ctx.settings.get().await?;
    let monthly_revenue = premium_subscriptions as f64 * settings.subscription_price;

    crate::metrics::ACCOUNTS_TOTAL.set(total_users);
    crate::metrics::ASSETS_TOTAL.set(total_images);
    crate::metrics::STORAGE_BYTES_TOTAL.set(total_storage_bytes);

    Ok(Json(AdminStats {
        total_users,
        banned_users,
        total_images,
        flagged_images,
        total_storage_bytes,
        premium_subscriptions,
        monthly_revenue,
        signups_today,
    }))
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_per_page")]
    per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    50
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminUserRow {
    id: String,
    name: String,
    email: String,
    role: String,
    is_banned: bool,
    storage_used: i64,
    storage_limit: i64,
    image_count: i64,
    is_premium: bool,
    created_at: chrono::DateTime<chrono::Utc>,
}

/// GET /admin/users
async fn list_users(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Query(query): Query<PageQuery>,
) -> HostResult<Json<serde_json::Value>> {
    let page = query.page.max(1);
    let per_page = query.per_page.clamp(1, 100);
    let offset = (page - 1) * per_page;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user")
        .fetch_one(&ctx.db)
        .await
        .map_err(HostError::Database)?;

    let rows: Vec<(
        String,
        String,
        String,
        String,
        bool,
        i64,
        i64,
        i64,
        bool,
        chrono::DateTime<chrono::Utc>,
    )> = sqlx::query_as(
        r#"
        SELECT u.id, u.name, u.email, u.role, u.is_banned, u.storage_used, u.storage_limit,
               (SELECT COUNT(*) FROM asset a WHERE a.user_id = u.id),
               EXISTS(SELECT 1 FROM subscription s WHERE s.user_id = u.id AND s.status = 'ACTIVE'),
               u.created_at
        FROM user u
        ORDER BY u.created_at DESC
        LIMIT ?1 OFFSET ?2
        "#,
    )
    .bind(per_page)
    .bind(offset)
    .fetch_all(&ctx.db)
    .await
    .map_err(HostError::Database)?;

    let users: Vec<AdminUserRow> = rows
        .into_iter()
        .map(
            |(id, name, email, role, is_banned, storage_used, storage_limit, image_count, is_premium, created_at)| {
                AdminUserRow {
                    id,
                    name,
                    email,
                    role,
                    is_banned,
                    storage_used,
                    storage_limit,
                    image_count,
                    is_premium,
                    created_at,
                }
            },
        )
        .collect();

    Ok(Json(serde_json::json!({
        "users": users,
        "total": total,
        "page": page,
        "perPage": per_page,
    })))
}

/// PATCH /admin/users/:id/ban
async fn ban_user(
    State(ctx): State<AppContext>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> HostResult<Json<serde_json::Value>> {
    if id == admin.user.id {
        return Err(HostError::Validation("Cannot ban yourself".to_string()));
    }

    ctx.user_manager.set_banned(&id, true).await?;

    crate::metrics::record_moderation_action("ban", "user");
    ctx.notifier.notify_moderation("ban", &id, &admin.user.name);
    tracing::info!("Admin {} banned user {}", admin.user.id, id);

    Ok(Json(serde_json::json!({ "message": "User banned" })))
}

/// PATCH /admin/users/:id/unban
async fn unban_user(
    State(ctx): State<AppContext>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> HostResult<Json<serde_json::Value>> {
    ctx.user_manager.set_banned(&id, false).await?;

    crate::metrics::record_moderation_action("unban", "user");
    ctx.notifier
        .notify_moderation("unban", &id, &admin.user.name);

    Ok(Json(serde_json::json!({ "message": "User unbanned" })))
}

/// DELETE /admin/users/:id
async fn delete_user(
    State(ctx): State<AppContext>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> HostResult<Json<serde_json::Value>> {
    if id == admin.user.id {
        return Err(HostError::Validation("Cannot delete yourself".to_string()));
    }

    let purged = ctx.asset_store.purge_user_assets(&id).await?;
    ctx.user_manager.delete_user(&id).await?;

    crate::metrics::record_moderation_action("delete", "user");
    ctx.notifier
        .notify_moderation("delete user", &id, &admin.user.name);
    tracing::info!(
        "Admin {} deleted user {} along with {} assets",
        admin.user.id,
        id,
        purged
    );

    Ok(Json(serde_json::json!({ "message": "User deleted" })))
}

/// GET /admin/images
async fn list_images(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
    Query(query): Query<PageQuery>,
) -> HostResult<Json<serde_json::Value>> {
    let page = query.page.max(1);
    let per_page = query.per_page.clamp(1, 100);
    let offset = (page - 1) * per_page;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM asset")
        .fetch_one(&ctx.db)
        .await
        .map_err(HostError::Database)?;

    let assets = sqlx::query_as::<_, Asset>(
        "SELECT * FROM asset ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
    )
    .bind(per_page)
    .bind(offset)
    .fetch_all(&ctx.db)
    .await
    .map_err(HostError::Database)?;

    let images: Vec<AssetView> = assets.into_iter().map(AssetView::from).collect();

    Ok(Json(serde_json::json!({
        "images": images,
        "total": total,
        "page": page,
        "perPage": per_page,
    })))
}

/// DELETE /admin/images/:id
async fn delete_image(
    State(ctx): State<AppContext>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> HostResult<Json<serde_json::Value>> {
    ctx.asset_store.delete_any(&id).await?;

    crate::metrics::record_moderation_action("delete", "image");
    ctx.notifier
        .notify_moderation("delete image", &id, &admin.user.name);

    Ok(Json(serde_json::json!({ "message": "Image deleted" })))
}

#[derive(Debug, Deserialize)]
struct FlagRequest {
    flagged: bool,
    reason: Option<String>,
}

/// PATCH /admin/images/:id
async fn flag_image(
    State(ctx): State<AppContext>,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<FlagRequest>,
) -> HostResult<Json<serde_json::Value>> {
    ctx.asset_store
        .set_flag(&id, req.flagged, req.reason.as_deref())
        .await?;

    crate::metrics::record_moderation_action(
        if req.flagged { "flag" } else { "unflag" },
        "image",
    );
    ctx.notifier.notify_moderation(
        if req.flagged { "flag" } else { "unflag" },
        &id,
        &admin.user.name,
    );

    Ok(Json(serde_json::json!({ "message": "Image updated" })))
}

/// GET /admin/settings
async fn get_settings(
    State(ctx): State<AppContext>,
    _admin: AdminUser,
) -> HostResult<Json<SiteSettings>> {
    Ok(Json(ctx.settings.get().await?))
}

/// PATCH /admin/settings
async fn update_settings(
    State(ctx): State<AppContext>,
    admin: AdminUser,
    Json(update): Json<SettingsUpdate>,
) -> HostResult<Json<SiteSettings>> {
    let settings = ctx.settings.update(update).await?;
    tracing::info!("Admin {} updated site settings", admin.user.id);
    Ok(Json(settings))
}
