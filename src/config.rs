/// Configuration management for the hosting service
use crate::error::{HostError, HostResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub limits: LimitConfig,
    pub billing: BillingConfig,
    pub notifier: NotifierConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
    /// Public base URL used when building asset URLs for the disk backend
    pub public_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub backend: StorageBackendConfig,
}

/// File storage backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StorageBackendConfig {
    Disk {
        location: PathBuf,
    },
    S3 {
        bucket: String,
        region: String,
        access_key_id: String,
        secret_access_key: String,
        endpoint: Option<String>,
    },
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Fallback tier limits, used before the settings row exists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitConfig {
    pub free_storage_limit: i64,
    pub premium_storage_limit: i64,
    pub free_max_file_size: i64,
    pub premium_max_file_size: i64,
}

/// Payment provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub price_id: Option<String>,
}

/// Chat webhook notifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub webhook_url: Option<String>,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

const MB: i64 = 1024 * 1024;

fn env_mb(key: &str, default_mb: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default_mb)
        * MB
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> HostResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("PXH_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("PXH_PORT")
            .unwrap_or_else(|_| "3080".to_string())
            .parse()
            .map_err(|_| HostError::Validation("Invalid port number".to_string()))?;

        let version = env::var("PXH_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let public_url = env::var("PXH_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));

        let data_directory: PathBuf = env::var("PXH_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("PXH_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("pixelhost.sqlite"));

        let backend = if let Ok(bucket) = env::var("PXH_S3_BUCKET") {
            StorageBackendConfig::S3 {
                bucket,
                region: env::var("PXH_S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                access_key_id: env::var("PXH_S3_ACCESS_KEY_ID")
                    .map_err(|_| HostError::Validation("S3 access key required".to_string()))?,
                secret_access_key: env::var("PXH_S3_SECRET_ACCESS_KEY")
                    .map_err(|_| HostError::Validation("S3 secret key required".to_string()))?,
                endpoint: env::var("PXH_S3_ENDPOINT").ok(),
            }
        } else {
            StorageBackendConfig::Disk {
                location: env::var("PXH_UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| data_directory.join("uploads")),
            }
        };

        let jwt_secret = env::var("PXH_JWT_SECRET")
            .map_err(|_| HostError::Validation("JWT secret required".to_string()))?;

        let limits = LimitConfig {
            free_storage_limit: env_mb("PXH_FREE_STORAGE_LIMIT_MB", 500),
            premium_storage_limit: env_mb("PXH_PREMIUM_STORAGE_LIMIT_MB", 25600),
            free_max_file_size: env_mb("PXH_FREE_MAX_FILE_SIZE_MB", 5),
            premium_max_file_size: env_mb("PXH_PREMIUM_MAX_FILE_SIZE_MB", 100),
        };

        let billing = BillingConfig {
            secret_key: env::var("STRIPE_SECRET_KEY").ok(),
            webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").ok(),
            price_id: env::var("STRIPE_PRICE_ID").ok(),
        };

        let notifier = NotifierConfig {
            webhook_url: env::var("PXH_DISCORD_WEBHOOK_URL").ok(),
        };

        let rate_limit_enabled = env::var("PXH_RATE_LIMITS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
                public_url,
            },
            storage: StorageConfig {
                data_directory,
                database,
                backend,
            },
            authentication: AuthConfig { jwt_secret },
            limits,
            billing,
            notifier,
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> HostResult<()> {
        if self.service.hostname.is_empty() {
            return Err(HostError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(HostError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.limits.free_max_file_size <= 0 || self.limits.premium_max_file_size <= 0 {
            return Err(HostError::Validation(
                "Upload size ceilings must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 3080,
                version: "0.1.0".to_string(),
                public_url: "http://localhost:3080".to_string(),
            },
            storage: StorageConfig {
                data_directory: "./data".into(),
                database: "./data/pixelhost.sqlite".into(),
                backend: StorageBackendConfig::Disk {
                    location: "./data/uploads".into(),
                },
            },
            authentication: AuthConfig {
                jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
            },
            limits: LimitConfig {
                free_storage_limit: 500 * MB,
                premium_storage_limit: 25600 * MB,
                free_max_file_size: 5 * MB,
                premium_max_file_size: 100 * MB,
            },
            billing: BillingConfig {
                secret_key: None,
                webhook_secret: None,
                price_id: None,
            },
            notifier: NotifierConfig { webhook_url: None },
            rate_limit: RateLimitConfig { enabled: true },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_jwt_secret() {
        let mut config = test_config();
        config.authentication.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_limits_match_tier_defaults() {
        let config = test_config();
        assert_eq!(config.limits.free_max_file_size, 5 * MB);
        assert_eq!(config.limits.premium_max_file_size, 100 * MB);
        assert_eq!(config.limits.free_storage_limit, 500 * MB);
        assert_eq!(config.limits.premium_storage_limit, 25600 * MB);
    }
}
