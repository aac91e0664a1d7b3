/// Asset management
///
/// Upload admission, persistence, galleries, share links, and the
/// usage accounting that keeps `user.storage_used` in step with the
/// bytes actually held for each account.

mod store;

pub use store::AssetStore;

use crate::db::models::Asset;
use serde::{Deserialize, Serialize};

/// Asset as returned to API clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetView {
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub width: i64,
    pub height: i64,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub is_favorite: bool,
    pub views: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Asset> for AssetView {
    fn from(asset: Asset) -> Self {
        Self {
            id: asset.id,
            filename: asset.filename,
            original_name: asset.original_name,
            mime_type: asset.mime_type,
            size: asset.size,
            width: asset.width,
            height: asset.height,
            url: asset.url,
            thumbnail_url: asset.thumbnail_url,
            is_favorite: asset.is_favorite,
            views: asset.views,
            created_at: asset.created_at,
        }
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub id: String,
    pub filename: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub delete_token: String,
    pub delete_url: String,
    pub size: i64,
}

/// Paged gallery listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPage {
    pub assets: Vec<AssetView>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Gallery listing parameters
#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    /// Restrict to favorites when true
    #[serde(default)]
    pub favorites: bool,
    /// Filter by name substring
    pub search: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    50
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
            favorites: false,
            search: None,
        }
    }
}
