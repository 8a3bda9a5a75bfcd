//! S3 client construction and the object-store surface the pipeline consumes

use crate::StoreError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Default presigned URL expiry time (15 minutes)
const DEFAULT_PRESIGNED_URL_EXPIRY_SECS: u64 = 900;

/// S3 connection configuration
#[derive(Clone, Debug)]
pub struct S3Config {
    pub region: String,
    /// Custom endpoint for S3-compatible storage (MinIO, R2, ...)
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl S3Config {
    pub fn from_env() -> Self {
        Self {
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint: std::env::var("S3_ENDPOINT").ok(),
            access_key_id: std::env::var("S3_ACCESS_KEY_ID").ok(),
            secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY").ok(),
        }
    }
}

/// Initialize the AWS S3 client with credentials from config
///
/// Falls back to the default credential chain when no explicit keys are
/// provided, so IAM roles keep working in production.
pub async fn get_s3_client(config: &S3Config) -> Client {
    use aws_sdk_s3::config::Region;

    let mut aws_config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.region.clone()));

    if let (Some(access_key_id), Some(secret_access_key)) =
        (&config.access_key_id, &config.secret_access_key)
    {
        use aws_sdk_s3::config::Credentials;

        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None, // No session token
            None, // No expiration
            "encoder_platform_s3",
        );

        aws_config_builder = aws_config_builder.credentials_provider(credentials);
    }

    if let Some(endpoint) = &config.endpoint {
        aws_config_builder = aws_config_builder.endpoint_url(endpoint);
    }

    let aws_config = aws_config_builder.load().await;

    Client::new(&aws_config)
}

/// The object-store operations the pipeline and ingestion boundary use
#[derive(Clone)]
pub struct ObjectStore {
    client: Client,
}

impl ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Download an object into a local file, returning the byte count.
    pub async fn download_object(
        &self,
        bucket: &str,
        key: &str,
        dest: &Path,
    ) -> Result<u64, StoreError> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Download {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: e.to_string(),
            })?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = resp
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Download {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: e.to_string(),
            })?
            .into_bytes();

        let written = bytes.len() as u64;
        tokio::fs::write(dest, bytes).await?;

        Ok(written)
    }

    /// Upload a local file with the given content type.
    pub async fn put_object_from_path(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StoreError::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: format!("failed to read {}: {}", path.display(), e),
            })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            // Packaged artifacts are immutable, versioned by prefix
            .cache_control("max-age=31536000")
            .send()
            .await
            .map_err(|e| {
                let message = e.to_string();
                let message = if message.contains("403") || message.contains("Forbidden") {
                    "S3 auth failed (403): check credentials".to_string()
                } else if message.contains("NoSuchBucket") {
                    format!("bucket not found: {bucket}")
                } else {
                    message
                };
                StoreError::Upload {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    message,
                }
            })?;

        Ok(())
    }

    /// List object keys under a prefix.
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<String>, StoreError> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .send()
            .await
            .map_err(|e| StoreError::List {
                bucket: bucket.to_string(),
                message: e.to_string(),
            })?;

        Ok(resp
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(|k| k.to_string()))
            .collect())
    }

    /// Delete an object; used when cleaning up after failed uploads.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Delete {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    /// Generate a presigned PUT URL so clients upload source files directly,
    /// without the ingestion service ever touching the bytes.
    pub async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        content_length: i64,
        expires_secs: Option<u64>,
    ) -> Result<String, StoreError> {
        content_type
            .parse::<mime::Mime>()
            .map_err(|_| StoreError::InvalidContentType(content_type.to_string()))?;

        let expires_in =
            Duration::from_secs(expires_secs.unwrap_or(DEFAULT_PRESIGNED_URL_EXPIRY_SECS));
        let presigning_config = PresigningConfig::builder()
            .expires_in(expires_in)
            .build()
            .map_err(|e| StoreError::Presign(e.to_string()))?;

        let presigned_request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .content_length(content_length)
            .presigned(presigning_config)
            .await
            .map_err(|e| StoreError::Presign(e.to_string()))?;

        Ok(presigned_request.uri().to_string())
    }

    /// Startup connectivity check: validates credentials, bucket existence,
    /// and list permission in one call. The pipeline cannot run without its
    /// buckets, so callers should treat a failure here as fatal.
    pub async fn health_check(&self, bucket: &str) -> Result<(), StoreError> {
        match self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(1)
            .send()
            .await
        {
            Ok(_) => {
                info!("S3 connection validated (bucket: {})", bucket);
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                let guidance = if message.contains("InvalidAccessKeyId") {
                    "Invalid access key id. Check S3_ACCESS_KEY_ID."
                } else if message.contains("SignatureDoesNotMatch") {
                    "Invalid secret access key. Check S3_SECRET_ACCESS_KEY."
                } else if message.contains("NoSuchBucket") {
                    "Bucket does not exist."
                } else if message.contains("AccessDenied") {
                    "Access denied. Ensure the IAM user/role has S3 permissions."
                } else {
                    "Ensure the bucket is reachable and credentials are valid."
                };
                Err(StoreError::HealthCheck(format!(
                    "{message}. {guidance} (bucket: {bucket})"
                )))
            }
        }
    }
}

/// Reject source file names whose extension is not an accepted video container.
pub fn validate_upload_extension(file_name: &str, allowed: &[&str]) -> Result<(), StoreError> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext {
        Some(ext) if allowed.contains(&ext.as_str()) => Ok(()),
        _ => Err(StoreError::InvalidFileFormat(file_name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALLOWED: &[&str] = &["mp4", "mkv", "mov", "webm"];

    #[test]
    fn test_validate_upload_extension() {
        assert!(validate_upload_extension("movie.mp4", ALLOWED).is_ok());
        assert!(validate_upload_extension("movie.MKV", ALLOWED).is_ok());
        assert!(validate_upload_extension("movie.exe", ALLOWED).is_err());
        assert!(validate_upload_extension("no_extension", ALLOWED).is_err());
    }
}
