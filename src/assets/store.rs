/// Asset persistence and upload admission
use crate::{
    assets::{AssetPage, AssetView, ListQuery, UploadReceipt},
    db::models::{Asset, User},
    error::{HostError, HostResult},
    settings::SiteSettings,
    storage::{self, media, FileBackend},
};
use chrono::Utc;
use rand::Rng;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Asset service
///
/// Owns the asset table and the file backend. Every byte-count change
/// to stored files goes through here so `user.storage_used` stays
/// consistent with the asset rows.
pub struct AssetStore {
    db: SqlitePool,
    files: Arc<dyn FileBackend>,
    public_url: String,
}

impl AssetStore {
    pub fn new(db: SqlitePool, files: Arc<dyn FileBackend>, public_url: String) -> Self {
        Self {
            db,
            files,
            public_url,
        }
    }

    pub fn backend(&self) -> Arc<dyn FileBackend> {
        self.files.clone()
    }

    /// Admission gate for uploads. Checks run in a fixed order so a
    /// request failing several checks always gets the same response:
    /// ban, then per-file size ceiling, then MIME allowlist, then quota.
    pub async fn admit_upload(
        &self,
        user: &User,
        is_premium: bool,
        settings: &SiteSettings,
        size: i64,
        mime_type: &str,
    ) -> HostResult<()> {
        if user.is_banned {
            return Err(HostError::Authorization("Account is banned".to_string()));
        }

        let max_bytes = settings.max_upload_bytes(is_premium);
        if size > max_bytes {
            return Err(HostError::PayloadTooLarge(format!(
                "Maximum file size is {} MB",
                max_bytes / (1024 * 1024)
            )));
        }

        if !media::is_allowed_mime(mime_type) {
            return Err(HostError::UnsupportedMediaType(mime_type.to_string()));
        }

        // Quota is checked against the limit recorded on the user row,
        // which only moves on billing transitions. A mid-cycle limit
        // reduction never strands already-stored bytes.
        if user.storage_used + size > user.storage_limit {
            return Err(HostError::QuotaExceeded);
        }

        Ok(())
    }

    /// Store an admitted upload: optimize, write original and thumbnail
    /// to the backend, then insert the row and bump usage in one
    /// transaction. The usage increment uses the size actually stored,
    /// which optimization may have shrunk below the admitted size.
    pub async fn store_upload(
        &self,
        user_id: &str,
        original_name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> HostResult<UploadReceipt> {
        let data = media::optimize_image(data, mime_type);
        let size = data.len() as i64;

        // Videos are not decoded; they get nominal dimensions
        let (width, height, duration) = if media::is_video(mime_type) {
            (1280, 720, Some(0.0f64))
        } else {
            let (w, h) = media::extract_dimensions(&data, mime_type);
            (w as i64, h as i64, None)
        };

        let filename = storage::generate_filename(original_name);
        let url = format!("{}/uploads/{}", self.public_url, filename);

        let thumbnail_url = match media::generate_thumbnail(&data, mime_type) {
            Some(thumb_data) => {
                let thumb_name = storage::thumbnail_filename(&filename);
                self.files.put(&thumb_name, thumb_data, mime_type).await?;
                Some(format!("{}/uploads/{}", self.public_url, thumb_name))
            }
            None => None,
        };

        self.files.put(&filename, data, mime_type).await?;

        let id = Uuid::new_v4().to_string();
        let delete_token = generate_delete_token();
        let now = Utc::now();

        let mut tx = self.db.begin().await.map_err(HostError::Database)?;

        sqlx::query(
            r#"
            INSERT INTO asset (
                id, user_id, filename, original_name, mime_type, size,
                width, height, duration, url, thumbnail_url,
                is_favorite, is_flagged, flag_reason, views, delete_token, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, 0, NULL, 0, ?12, ?13)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&filename)
        .bind(original_name)
        .bind(mime_type)
        .bind(size)
        .bind(width)
        .bind(height)
        .bind(duration)
        .bind(&url)
        .bind(&thumbnail_url)
        .bind(&delete_token)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(HostError::Database)?;

        sqlx::query("UPDATE user SET storage_used = storage_used + ?1 WHERE id = ?2")
            .bind(size)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(HostError::Database)?;

        tx.commit().await.map_err(HostError::Database)?;

        tracing::info!(
            "Stored upload {} for user {} ({} bytes)",
            filename,
            user_id,
            size
        );

        Ok(UploadReceipt {
            delete_url: format!(
                "{}/public/images/{}?token={}",
                self.public_url, id, delete_token
            ),
            delete_token,
            id,
            filename,
            url,
            thumbnail_url,
            size,
        })
    }

    /// Fetch an asset by id
    pub async fn get(&self, id: &str) -> HostResult<Asset> {
        sqlx::query_as::<_, Asset>("SELECT * FROM asset WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(HostError::Database)?
            .ok_or_else(|| HostError::NotFound("Image not found".to_string()))
    }

    /// Fetch an asset and bump its view counter, for public share links
    pub async fn get_public(&self, id: &str) -> HostResult<Asset> {
        let asset = self.get(id).await?;

        sqlx::query("UPDATE asset SET views = views + 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(HostError::Database)?;

        Ok(asset)
    }

    /// Paged gallery listing for a user, newest first
    pub async fn list_for_user(&self, user_id: &str, query: &ListQuery) -> HostResult<AssetPage> {
        let page = query.page.max(1);
        let per_page = query.per_page.clamp(1, 100);
        let offset = (page - 1) * per_page;

        let favorite_clause = if query.favorites {
            " AND is_favorite = 1"
        } else {
            ""
        };
        let search_clause = if query.search.is_some() {
            " AND original_name LIKE ?2 ESCAPE '\\'"
        } else {
            ""
        };
        let pattern = query.search.as_ref().map(|s| {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{}%", escaped)
        });

        let count_sql = format!(
            "SELECT COUNT(*) FROM asset WHERE user_id = ?1{}{}",
            favorite_clause, search_clause
        );
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(user_id);
        if let Some(p) = &pattern {
            count_query = count_query.bind(p);
        }
        let total = count_query
            .fetch_one(&self.db)
            .await
            .map_err(HostError::Database)?;

        let list_sql = format!(
            "SELECT * FROM asset WHERE user_id = ?1{}{} ORDER BY created_at DESC LIMIT {} OFFSET {}",
            favorite_clause, search_clause, per_page, offset
        );
        let mut list_query = sqlx::query_as::<_, Asset>(&list_sql).bind(user_id);
        if let Some(p) = &pattern {
            list_query = list_query.bind(p);
        }
        let assets = list_query
            .fetch_all(&self.db)
            .await
            .map_err(HostError::Database)?;

        Ok(AssetPage {
            assets: assets.into_iter().map(AssetView::from).collect(),
            total,
            page,
            per_page,
        })
    }

    /// Delete an asset as a signed-in requester. Owners may delete
    /// their own assets; admins may delete anyone's.
    pub async fn delete_owned(
        &self,
        requester_id: &str,
        requester_is_admin: bool,
        asset_id: &str,
    ) -> HostResult<()> {
        let asset = self.get(asset_id).await?;

        if asset.user_id != requester_id && !requester_is_admin {
            return Err(HostError::Authorization(
                "Not allowed to delete this image".to_string(),
            ));
        }

        self.remove_asset(asset).await
    }

    /// Delete an asset via its share-link delete token, no session needed
    pub async fn delete_by_token(&self, asset_id: &str, token: &str) -> HostResult<()> {
        let asset = self.get(asset_id).await?;

        if asset.delete_token != token {
            return Err(HostError::Authorization("Invalid delete token".to_string()));
        }

        self.remove_asset(asset).await
    }

    /// Admin removal, skips ownership checks
    pub async fn delete_any(&self, asset_id: &str) -> HostResult<()> {
        let asset = self.get(asset_id).await?;
        self.remove_asset(asset).await
    }

    /// Remove stored files, delete the row, and decrement usage by the
    /// recorded size in one transaction. Usage is clamped at zero so a
    /// double-delete race can never drive it negative. Byte removal is
    /// best-effort; leftovers are reclaimed by the orphan sweep.
    async fn remove_asset(&self, asset: Asset) -> HostResult<()> {
        if let Err(e) = self.files.delete(&asset.filename).await {
            tracing::warn!("Failed to remove stored file {}: {}", asset.filename, e);
        }
        if asset.thumbnail_url.is_some() {
            let thumb = storage::thumbnail_filename(&asset.filename);
            if let Err(e) = self.files.delete(&thumb).await {
                tracing::warn!("Failed to remove stored file {}: {}", thumb, e);
            }
        }

        let mut tx = self.db.begin().await.map_err(HostError::Database)?;

        let deleted = sqlx::query("DELETE FROM asset WHERE id = ?1")
            .bind(&asset.id)
            .execute(&mut *tx)
            .await
            .map_err(HostError::Database)?;

        if deleted.rows_affected() > 0 {
            sqlx::query(
                "UPDATE user SET storage_used = MAX(0, storage_used - ?1) WHERE id = ?2",
            )
            .bind(asset.size)
            .bind(&asset.user_id)
            .execute(&mut *tx)
            .await
            .map_err(HostError::Database)?;
        }

        tx.commit().await.map_err(HostError::Database)?;

        tracing::info!("Deleted asset {} ({} bytes)", asset.id, asset.size);
        Ok(())
    }

    /// Toggle the favorite flag on an owned asset
    pub async fn toggle_favorite(&self, user_id: &str, asset_id: &str) -> HostResult<bool> {
        let asset = self.get(asset_id).await?;

        if asset.user_id != user_id {
            return Err(HostError::NotFound("Image not found".to_string()));
        }

        let new_state = !asset.is_favorite;
        sqlx::query("UPDATE asset SET is_favorite = ?1 WHERE id = ?2")
            .bind(new_state)
            .bind(asset_id)
            .execute(&self.db)
            .await
            .map_err(HostError::Database)?;

        Ok(new_state)
    }

    /// Flag or clear moderation state on an asset
    pub async fn set_flag(
        &self,
        asset_id: &str,
        flagged: bool,
        reason: Option<&str>,
    ) -> HostResult<()> {
        let result = sqlx::query("UPDATE asset SET is_flagged = ?1, flag_reason = ?2 WHERE id = ?3")
            .bind(flagged)
            .bind(reason)
            .bind(asset_id)
            .execute(&self.db)
            .await
            .map_err(HostError::Database)?;

        if result.rows_affected() == 0 {
            return Err(HostError::NotFound("Image not found".to_string()));
        }

        Ok(())
    }

    /// Delete all of a user's assets and their stored bytes, then zero
    /// their usage. Used before account deletion.
    pub async fn purge_user_assets(&self, user_id: &str) -> HostResult<u64> {
        let assets = sqlx::query_as::<_, Asset>("SELECT * FROM asset WHERE user_id = ?1")
            .bind(user_id)
            .fetch_all(&self.db)
            .await
            .map_err(HostError::Database)?;

        let count = assets.len() as u64;

        for asset in &assets {
            if let Err(e) = self.files.delete(&asset.filename).await {
                tracing::warn!("Failed to remove stored file {}: {}", asset.filename, e);
            }
            if asset.thumbnail_url.is_some() {
                let thumb = storage::thumbnail_filename(&asset.filename);
                if let Err(e) = self.files.delete(&thumb).await {
                    tracing::warn!("Failed to remove stored file {}: {}", thumb, e);
                }
            }
        }

        let mut tx = self.db.begin().await.map_err(HostError::Database)?;

        sqlx::query("DELETE FROM asset WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(HostError::Database)?;

        sqlx::query("UPDATE user SET storage_used = 0 WHERE id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(HostError::Database)?;

        tx.commit().await.map_err(HostError::Database)?;

        Ok(count)
    }

    /// Filenames referenced by any asset row, originals and thumbnails.
    /// The orphan sweep deletes stored files not in this set.
    pub async fn referenced_filenames(&self) -> HostResult<std::collections::HashSet<String>> {
        let rows: Vec<(String, Option<String>)> =
            sqlx::query_as("SELECT filename, thumbnail_url FROM asset")
                .fetch_all(&self.db)
                .await
                .map_err(HostError::Database)?;

        let mut names = std::collections::HashSet::new();
        for (filename, thumbnail_url) in rows {
            if thumbnail_url.is_some() {
                names.insert(storage::thumbnail_filename(&filename));
            }
            names.insert(filename);
        }

        Ok(names)
    }
}

/// Random token for unauthenticated share-link deletion
fn generate_delete_token() -> String {
    let bytes: [u8; 12] = rand::thread_rng().gen();
    hex::encode(bytes)
}
