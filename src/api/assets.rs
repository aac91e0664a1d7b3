/// Upload and gallery endpoints
use crate::{
    assets::{AssetPage, ListQuery, UploadReceipt},
    auth::AuthUser,
    context::AppContext,
    error::{HostError, HostResult},
};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    routing::{delete, get, patch, post},
    Json, Router,
};

/// Transport-level body cap. The real per-tier ceilings are enforced
/// by the admission gate; this only stops unbounded bodies.
const MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .route("/images", get(list_images))
        .route("/images/:id", delete(delete_image))
        .route("/images/:id/favorite", patch(toggle_favorite))
}

/// POST /upload
///
/// Multipart upload. The admission gate runs after the bytes are read;
/// field-declared sizes are not trusted.
async fn upload(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> HostResult<Json<UploadReceipt>> {
    let mut file: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HostError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let original_name = field
                .file_name()
                .unwrap_or("upload.bin")
                .to_string();
            let mime_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| HostError::Validation(format!("Failed to read upload: {}", e)))?
                .to_vec();

            file = Some((original_name, mime_type, data));
        }
    }

    let Some((original_name, mime_type, data)) = file else {
        return Err(HostError::Validation("No file provided".to_string()));
    };

    let settings = ctx.settings.get().await?;
    let is_premium = ctx.billing.is_premium(&auth.user.id).await?;

    if let Err(e) = ctx
        .asset_store
        .admit_upload(
            &auth.user,
            is_premium,
            &settings,
            data.len() as i64,
            &mime_type,
        )
        .await
    {
        crate::metrics::record_upload_rejected(rejection_reason(&e));
        return Err(e);
    }

    let receipt = ctx
        .asset_store
        .store_upload(&auth.user.id, &original_name, &mime_type, data)
        .await?;

    crate::metrics::record_upload(&mime_type);
    ctx.notifier
        .notify_upload(&auth.user.name, &receipt.filename, receipt.size);

    Ok(Json(receipt))
}

fn rejection_reason(e: &HostError) -> &'static str {
    match e {
        HostError::Authorization(_) => "banned",
        HostError::PayloadTooLarge(_) => "size",
        HostError::UnsupportedMediaType(_) => "mime",
        HostError::QuotaExceeded => "quota",
        _ => "other",
    }
}

/// GET /images
async fn list_images(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> HostResult<Json<AssetPage>> {
    let page = ctx.asset_store.list_for_user(&auth.user.id, &query).await?;
    Ok(Json(page))
}

/// DELETE /images/:id
async fn delete_image(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> HostResult<Json<serde_json::Value>> {
    ctx.asset_store
        .delete_owned(&auth.user.id, auth.user.is_admin(), &id)
        .await?;
    Ok(Json(serde_json::json!({ "message": "Image deleted" })))
}

/// PATCH /images/:id/favorite
async fn toggle_favorite(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> HostResult<Json<serde_json::Value>> {
    let is_favorite = ctx.asset_store.toggle_favorite(&auth.user.id, &id).await?;
    Ok(Json(serde_json::json!({ "isFavorite": is_favorite })))
}
