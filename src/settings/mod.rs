/// Site settings singleton
///
/// A single row (id = "default") holds the instance-wide knobs:
/// theming, tier limits, pricing, and maintenance mode. The row is
/// created lazily with defaults on first read.
use crate::error::{HostError, HostResult};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

const SETTINGS_ID: &str = "default";

/// Instance-wide settings row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SiteSettings {
    pub id: String,
    pub theme: String,
    pub primary_color: String,
    pub enable_animations: bool,
    /// Free-tier upload ceiling in megabytes
    pub max_upload_size_free: i64,
    /// Premium-tier upload ceiling in megabytes
    pub max_upload_size_premium: i64,
    pub subscription_price: f64,
    /// Free-tier storage quota in bytes
    pub free_storage_limit: i64,
    /// Premium-tier storage quota in bytes
    pub premium_storage_limit: i64,
    pub homepage_title: String,
    pub homepage_subtitle: String,
    pub enable_google_auth: bool,
    pub enable_nsfw_detection: bool,
    pub maintenance_mode: bool,
    pub maintenance_message: Option<String>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            id: SETTINGS_ID.to_string(),
            theme: "nature".to_string(),
            primary_color: "#22c55e".to_string(),
            enable_animations: true,
            max_upload_size_free: 5,
            max_upload_size_premium: 100,
            subscription_price: 3.25,
            free_storage_limit: 524_288_000,
            premium_storage_limit: 26_843_545_600,
            homepage_title: "Host your images".to_string(),
            homepage_subtitle: "Fast, simple media hosting".to_string(),
            enable_google_auth: false,
            enable_nsfw_detection: false,
            maintenance_mode: false,
            maintenance_message: None,
        }
    }
}

impl SiteSettings {
    /// Upload ceiling in bytes for the given tier
    pub fn max_upload_bytes(&self, premium: bool) -> i64 {
        let mb = if premium {
            self.max_upload_size_premium
        } else {
            self.max_upload_size_free
        };
        mb * 1024 * 1024
    }

    /// Storage quota in bytes for the given tier
    pub fn storage_limit_bytes(&self, premium: bool) -> i64 {
        if premium {
            self.premium_storage_limit
        } else {
            self.free_storage_limit
        }
    }
}

/// Fields an admin may change. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub theme: Option<String>,
    pub primary_color: Option<String>,
    pub enable_animations: Option<bool>,
    pub max_upload_size_free: Option<i64>,
    pub max_upload_size_premium: Option<i64>,
    pub subscription_price: Option<f64>,
    pub free_storage_limit: Option<i64>,
    pub premium_storage_limit: Option<i64>,
    pub homepage_title: Option<String>,
    pub homepage_subtitle: Option<String>,
    pub enable_google_auth: Option<bool>,
    pub enable_nsfw_detection: Option<bool>,
    pub maintenance_mode: Option<bool>,
    pub maintenance_message: Option<String>,
}

/// Settings service
pub struct SettingsManager {
    db: SqlitePool,
}

impl SettingsManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Fetch the settings row, creating it with defaults if missing
    pub async fn get(&self) -> HostResult<SiteSettings> {
        let existing = sqlx::query_as::<_, SiteSettings>(
            "SELECT * FROM site_settings WHERE id = ?1",
        )
        .bind(SETTINGS_ID)
        .fetch_optional(&self.db)
        .await
        .map_err(HostError::Database)?;

        match existing {
            Some(settings) => Ok(settings),
            None => {
                let defaults = SiteSettings::default();
                self.insert(&defaults).await?;
                Ok(defaults)
            }
        }
    }

    /// Apply a partial update and return the merged row
    pub async fn update(&self, update: SettingsUpdate) -> HostResult<SiteSettings> {
        let mut settings = self.get().await?;

        if let Some(v) = update.theme {
            settings.theme = v;
        }
        if let Some(v) = update.primary_color {
            settings.primary_color = v;
        }
        if let Some(v) = update.enable_animations {
            settings.enable_animations = v;
        }
        if let Some(v) = update.max_upload_size_free {
            settings.max_upload_size_free = v;
        }
        if let Some(v) = update.max_upload_size_premium {
            settings.max_upload_size_premium = v;
        }
        if let Some(v) = update.subscription_price {
            settings.subscription_price = v;
        }
        if let Some(v) = update.free_storage_limit {
            settings.free_storage_limit = v;
        }
        if let Some(v) = update.premium_storage_limit {
            settings.premium_storage_limit = v;
        }
        if let Some(v) = update.homepage_title {
            settings.homepage_title = v;
        }
        if let Some(v) = update.homepage_subtitle {
            settings.homepage_subtitle = v;
        }
        if let Some(v) = update.enable_google_auth {
            settings.enable_google_auth = v;
        }
        if let Some(v) = update.enable_nsfw_detection {
            settings.enable_nsfw_detection = v;
        }
        if let Some(v) = update.maintenance_mode {
            settings.maintenance_mode = v;
        }
        if update.maintenance_message.is_some() {
            settings.maintenance_message = update.maintenance_message;
        }

        self.validate(&settings)?;
        self.insert(&settings).await?;

        Ok(settings)
    }

    fn validate(&self, settings: &SiteSettings) -> HostResult<()> {
        if settings.max_upload_size_free <= 0 || settings.max_upload_size_premium <= 0 {
            return Err(HostError::Validation(
                "Upload size ceilings must be positive".to_string(),
            ));
        }
        if settings.free_storage_limit <= 0 || settings.premium_storage_limit <= 0 {
            return Err(HostError::Validation(
                "Storage limits must be positive".to_string(),
            ));
        }
        if settings.subscription_price < 0.0 {
            return Err(HostError::Validation(
                "Subscription price cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    async fn insert(&self, settings: &SiteSettings) -> HostResult<()> {
        sqlx::query(
            r#"
            INSERT INTO site_settings (
                id, theme, primary_color, enable_animations,
                max_upload_size_free, max_upload_size_premium, subscription_price,
                free_storage_limit, premium_storage_limit,
                homepage_title, homepage_subtitle,
                enable_google_auth, enable_nsfw_detection,
                maintenance_mode, maintenance_message
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT(id) DO UPDATE SET
                theme = excluded.theme,
                primary_color = excluded.primary_color,
                enable_animations = excluded.enable_animations,
                max_upload_size_free = excluded.max_upload_size_free,
                max_upload_size_premium = excluded.max_upload_size_premium,
                subscription_price = excluded.subscription_price,
                free_storage_limit = excluded.free_storage_limit,
                premium_storage_limit = excluded.premium_storage_limit,
                homepage_title = excluded.homepage_title,
                homepage_subtitle = excluded.homepage_subtitle,
                enable_google_auth = excluded.enable_google_auth,
                enable_nsfw_detection = excluded.enable_nsfw_detection,
                maintenance_mode = excluded.maintenance_mode,
                maintenance_message = excluded.maintenance_message
            "#,
        )
        .bind(&settings.id)
        .bind(&settings.theme)
        .bind(&settings.primary_color)
        .bind(settings.enable_animations)
        .bind(settings.max_upload_size_free)
        .bind(settings.max_upload_size_premium)
        .bind(settings.subscription_price)
        .bind(settings.free_storage_limit)
        .bind(settings.premium_storage_limit)
        .bind(&settings.homepage_title)
        .bind(&settings.homepage_subtitle)
        .bind(settings.enable_google_auth)
        .bind(settings.enable_nsfw_detection)
        .bind(settings.maintenance_mode)
        .bind(&settings.maintenance_message)
        .execute(&self.db)
        .await
        .map_err(HostError::Database)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_manager() -> SettingsManager {
        SettingsManager::new(crate::db::test_pool().await)
    }

    #[tokio::test]
    async fn test_get_creates_defaults() {
        let mgr = test_manager().await;

        let settings = mgr.get().await.unwrap();
        assert_eq!(settings.theme, "nature");
        assert_eq!(settings.primary_color, "#22c55e");
        assert_eq!(settings.max_upload_size_free, 5);
        assert_eq!(settings.free_storage_limit, 524_288_000);
        assert!(!settings.maintenance_mode);

        // Second read returns the persisted row
        let again = mgr.get().await.unwrap();
        assert_eq!(again.theme, settings.theme);
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let mgr = test_manager().await;

        let updated = mgr
            .update(SettingsUpdate {
                maintenance_mode: Some(true),
                maintenance_message: Some("Back soon".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(updated.maintenance_mode);
        assert_eq!(updated.maintenance_message.as_deref(), Some("Back soon"));
        assert_eq!(updated.theme, "nature");
        assert_eq!(updated.max_upload_size_premium, 100);
    }

    #[tokio::test]
    async fn test_update_rejects_nonpositive_limits() {
        let mgr = test_manager().await;

        let err = mgr
            .update(SettingsUpdate {
                max_upload_size_free: Some(0),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, HostError::Validation(_)));
    }

    #[test]
    fn test_tier_helpers() {
        let settings = SiteSettings::default();
        assert_eq!(settings.max_upload_bytes(false), 5 * 1024 * 1024);
        assert_eq!(settings.max_upload_bytes(true), 100 * 1024 * 1024);
        assert_eq!(settings.storage_limit_bytes(true), 26_843_545_600);
    }
}
