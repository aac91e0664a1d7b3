/// Disk-based file storage backend
use crate::{
    error::{HostError, HostResult},
    storage::FileBackend,
};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Disk storage backend
///
/// Stores uploads flat under a single directory. Filenames are
/// timestamp-prefixed and unique, so no sharding is needed at the
/// scale this serves.
#[derive(Clone)]
pub struct DiskFileBackend {
    base_path: PathBuf,
}

impl DiskFileBackend {
    /// Create a new disk storage backend
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn file_path(&self, filename: &str) -> PathBuf {
        self.base_path.join(filename)
    }

    async fn ensure_base_dir(&self) -> HostResult<()> {
        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            HostError::Storage(format!("Failed to create upload directory: {}", e))
        })
    }
}

#[async_trait]
impl FileBackend for DiskFileBackend {
    async fn put(&self, filename: &str, data: Vec<u8>, _mime_type: &str) -> HostResult<()> {
        self.ensure_base_dir().await?;

        let path = self.file_path(filename);
        fs::write(&path, data)
            .await
            .map_err(|e| HostError::Storage(format!("Failed to write file {}: {}", filename, e)))?;

        Ok(())
    }

    async fn get(&self, filename: &str) -> HostResult<Option<Vec<u8>>> {
        let path = self.file_path(filename);

        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HostError::Storage(format!(
                "Failed to read file {}: {}",
                filename, e
            ))),
        }
    }

    async fn delete(&self, filename: &str) -> HostResult<()> {
        let path = self.file_path(filename);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HostError::Storage(format!(
                "Failed to delete file {}: {}",
                filename, e
            ))),
        }
    }

    async fn exists(&self, filename: &str) -> HostResult<bool> {
        Ok(self.file_path(filename).exists())
    }

    async fn list(&self) -> HostResult<Vec<String>> {
        let mut names = Vec::new();

        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => {
                return Err(HostError::Storage(format!(
                    "Failed to list upload directory: {}",
                    e
                )))
            }
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| HostError::Storage(format!("Failed to list upload directory: {}", e)))?
        {
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_and_get_file() {
        let dir = tempdir().unwrap();
        let backend = DiskFileBackend::new(dir.path().to_path_buf());

        let data = b"file contents".to_vec();
        backend.put("123_abc.png", data.clone(), "image/png").await.unwrap();

        let retrieved = backend.get("123_abc.png").await.unwrap();
        assert_eq!(retrieved, Some(data));
    }

    #[tokio::test]
    async fn test_get_nonexistent_file() {
        let dir = tempdir().unwrap();
        let backend = DiskFileBackend::new(dir.path().to_path_buf());

        let result = backend.get("missing.png").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let backend = DiskFileBackend::new(dir.path().to_path_buf());

        backend.put("123_abc.png", b"x".to_vec(), "image/png").await.unwrap();
        assert!(backend.exists("123_abc.png").await.unwrap());

        backend.delete("123_abc.png").await.unwrap();
        assert!(!backend.exists("123_abc.png").await.unwrap());

        // Deleting a missing file is not an error
        backend.delete("123_abc.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_files() {
        let dir = tempdir().unwrap();
        let backend = DiskFileBackend::new(dir.path().to_path_buf());

        backend.put("a.png", b"1".to_vec(), "image/png").await.unwrap();
        backend.put("b.png", b"2".to_vec(), "image/png").await.unwrap();

        let mut names = backend.list().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["a.png", "b.png"]);
    }
}
