/// File Storage System
///
/// Handles binary file storage for uploaded images and videos.
/// Supports multiple backend implementations (disk, S3, etc.)

pub mod disk;
pub mod media;
pub mod s3;

pub use disk::DiskFileBackend;
pub use s3::{S3Config, S3FileBackend};

use crate::{
    config::StorageBackendConfig,
    error::{HostError, HostResult},
};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;

/// File storage backend trait
///
/// Implementations handle the actual storage and retrieval of file bytes,
/// keyed by the unique filename assigned at upload time.
#[async_trait]
pub trait FileBackend: Send + Sync {
    /// Store a file under its assigned filename
    async fn put(&self, filename: &str, data: Vec<u8>, mime_type: &str) -> HostResult<()>;

    /// Retrieve a file by filename
    async fn get(&self, filename: &str) -> HostResult<Option<Vec<u8>>>;

    /// Delete a file by filename
    async fn delete(&self, filename: &str) -> HostResult<()>;

    /// Check if a file exists
    async fn exists(&self, filename: &str) -> HostResult<bool>;

    /// List all stored filenames, used by the orphan sweep job
    async fn list(&self) -> HostResult<Vec<String>>;
}

/// Build a backend from configuration
pub async fn create_backend(
    config: &StorageBackendConfig,
) -> HostResult<Arc<dyn FileBackend>> {
    match config {
        StorageBackendConfig::Disk { location } => {
            Ok(Arc::new(DiskFileBackend::new(location.clone())))
        }
        StorageBackendConfig::S3 {
            bucket,
            region,
            access_key_id,
            secret_access_key,
            endpoint,
        } => {
            let backend = S3FileBackend::new(S3Config {
                bucket: bucket.clone(),
                region: region.clone(),
                endpoint: endpoint.clone(),
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                prefix: "uploads/".to_string(),
            })
            .await?;
            Ok(Arc::new(backend))
        }
    }
}

/// Generate a collision-resistant filename: {unix_millis}_{random8}.{ext}
pub fn generate_filename(original_name: &str) -> String {
    let ext = original_name
        .rsplit_once('.')
        .map(|(_, e)| e)
        .filter(|e| !e.is_empty() && e.len() <= 8)
        .unwrap_or("bin")
        .to_lowercase();

    let random: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(8)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();

    format!("{}_{}.{}", Utc::now().timestamp_millis(), random, ext)
}

/// Thumbnail filename for an original
pub fn thumbnail_filename(filename: &str) -> String {
    format!("thumb_{}", filename)
}

/// Reject filenames that could escape the storage root
pub fn validate_filename(filename: &str) -> HostResult<()> {
    if filename.is_empty()
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
    {
        return Err(HostError::Validation("Invalid filename".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_filename_keeps_extension() {
        let name = generate_filename("holiday photo.PNG");
        assert!(name.ends_with(".png"));
        let parts: Vec<&str> = name.splitn(2, '_').collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].parse::<i64>().is_ok());
    }

    #[test]
    fn test_generate_filename_unknown_extension() {
        let name = generate_filename("noext");
        assert!(name.ends_with(".bin"));
    }

    #[test]
    fn test_thumbnail_filename() {
        assert_eq!(
            thumbnail_filename("123_abc.png"),
            "thumb_123_abc.png"
        );
    }

    #[test]
    fn test_validate_filename_rejects_traversal() {
        assert!(validate_filename("../etc/passwd").is_err());
        assert!(validate_filename("a/b.png").is_err());
        assert!(validate_filename("").is_err());
        assert!(validate_filename("123_abc.png").is_ok());
    }
}
