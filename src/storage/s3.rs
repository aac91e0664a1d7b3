/// S3-compatible file storage backend
use crate::{
    error::{HostError, HostResult},
    storage::FileBackend,
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::sync::Arc;
use tracing::{debug, error, info};

/// S3 file storage backend
///
/// Supports AWS S3 and S3-compatible storage providers (MinIO, DigitalOcean Spaces, etc.)
#[derive(Clone)]
pub struct S3FileBackend {
    client: Arc<Client>,
    bucket: String,
    prefix: String,
}

/// Configuration for S3 storage
#[derive(Debug, Clone)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,

    /// AWS region (e.g., "us-east-1")
    pub region: String,

    /// Custom endpoint for S3-compatible services (e.g., MinIO, DigitalOcean Spaces)
    pub endpoint: Option<String>,

    /// AWS access key ID
    pub access_key_id: String,

    /// AWS secret access key
    pub secret_access_key: String,

    /// Key prefix for all objects (default: "uploads/")
    pub prefix: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: String::new(),
            secret_access_key: String::new(),
            prefix: "uploads/".to_string(),
        }
    }
}

impl S3FileBackend {
    /// Create a new S3 file backend
    pub async fn new(config: S3Config) -> HostResult<Self> {
        info!(
            "Initializing S3 file storage (bucket: {}, region: {})",
            config.bucket, config.region
        );

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "pixelhost",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        if let Some(endpoint) = &config.endpoint {
            debug!("Using custom S3 endpoint: {}", endpoint);
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true); // Required for MinIO and some S3-compatible services
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!("✓ S3 file storage initialized");

        Ok(Self {
            client: Arc::new(client),
            bucket: config.bucket,
            prefix: config.prefix,
        })
    }

    fn object_key(&self, filename: &str) -> String {
        format!("{}{}", self.prefix, filename)
    }
}

#[async_trait]
impl FileBackend for S3FileBackend {
    async fn put(&self, filename: &str, data: Vec<u8>, mime_type: &str) -> HostResult<()> {
        let key = self.object_key(filename);

        debug!(
            "Uploading file to S3: {} ({} bytes, type: {})",
            key,
            data.len(),
            mime_type
        );

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .content_type(mime_type)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to upload file to S3: {}", e);
                HostError::Storage(format!("S3 upload failed: {}", e))
            })?;

        debug!("✓ File uploaded to S3: {}", key);
        Ok(())
    }

    async fn get(&self, filename: &str) -> HostResult<Option<Vec<u8>>> {
        let key = self.object_key(filename);

        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(response) => {
                let data = response
                    .body
                    .collect()
                    .await
                    .map_err(|e| {
                        error!("Failed to read S3 object body: {}", e);
                        HostError::Storage(format!("Failed to read S3 object: {}", e))
                    })?
                    .into_bytes()
                    .to_vec();

                Ok(Some(data))
            }
            Err(e) => {
                let error_msg = format!("{:?}", e);
                if error_msg.contains("NoSuchKey") || error_msg.contains("NotFound") {
                    debug!("File not found in S3: {}", key);
                    Ok(None)
                } else {
                    error!("Failed to download file from S3: {}", e);
                    Err(HostError::Storage(format!("S3 download failed: {}", e)))
                }
            }
        }
    }

    async fn delete(&self, filename: &str) -> HostResult<()> {
        let key = self.object_key(filename);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to delete file from S3: {}", e);
                HostError::Storage(format!("S3 delete failed: {}", e))
            })?;

        debug!("✓ File deleted from S3: {}", key);
        Ok(())
    }

    async fn exists(&self, filename: &str) -> HostResult<bool> {
        let key = self.object_key(filename);

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let error_msg = format!("{:?}", e);
                if error_msg.contains("NotFound") {
                    Ok(false)
                } else {
                    error!("Failed to check file existence in S3: {}", e);
                    Err(HostError::Storage(format!("S3 head object failed: {}", e)))
                }
            }
        }
    }

    async fn list(&self) -> HostResult<Vec<String>> {
        let mut names = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&self.prefix);

            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| {
                error!("Failed to list S3 objects: {}", e);
                HostError::Storage(format!("S3 list failed: {}", e))
            })?;

            for object in response.contents() {
                if let Some(key) = object.key() {
                    if let Some(name) = key.strip_prefix(&self.prefix) {
                        names.push(name.to_string());
                    }
                }
            }

            match response.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(names)
    }
}
