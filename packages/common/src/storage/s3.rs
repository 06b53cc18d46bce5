use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use tokio::io::AsyncReadExt;

use super::error::StorageError;
use super::path::validate_object_path;
use super::traits::{BoxReader, SignedUrl, VideoStore};
use crate::config::S3Config;

/// S3-compatible video store. Playback links are presigned GET URLs.
pub struct S3VideoStore {
    bucket: Box<Bucket>,
    max_size: u64,
}

fn backend_err(err: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(err.to_string())
}

impl S3VideoStore {
    pub fn new(config: &S3Config, max_size: u64) -> Result<Self, StorageError> {
        let region = if config.endpoint.is_empty() {
            config.region.parse::<Region>().map_err(backend_err)?
        } else {
            Region::Custom {
                region: config.region.clone(),
                endpoint: config.endpoint.clone(),
            }
        };
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(backend_err)?;

        let mut bucket = Bucket::new(&config.bucket, region, credentials).map_err(backend_err)?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }
        Ok(Self { bucket, max_size })
    }
}

#[async_trait]
impl VideoStore for S3VideoStore {
    async fn put_stream(
        &self,
        path: &str,
        content_type: &str,
        reader: BoxReader,
    ) -> Result<u64, StorageError> {
        let path = validate_object_path(path)?;
        // One byte past the limit is enough to detect an oversized upload.
        let mut limited = reader.take(self.max_size + 1);
        let response = self
            .bucket
            .put_object_stream_with_content_type(&mut limited, path, content_type)
            .await
            .map_err(backend_err)?;

        let uploaded = response.uploaded_bytes() as u64;
        if uploaded > self.max_size {
            if let Err(e) = self.bucket.delete_object(path).await {
                tracing::warn!(path, error = %e, "Failed to remove oversized upload");
            }
            return Err(StorageError::SizeLimitExceeded {
                actual: uploaded,
                limit: self.max_size,
            });
        }
        if response.status_code() >= 300 {
            return Err(StorageError::Backend(format!(
                "upload of {path} returned status {}",
                response.status_code()
            )));
        }
        Ok(uploaded)
    }

    async fn open(&self, _path: &str) -> Result<BoxReader, StorageError> {
        Err(StorageError::Unsupported(
            "open (objects are served through presigned URLs)",
        ))
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let path = validate_object_path(path)?;
        match self.bucket.head_object(path).await {
            Ok((_, code)) => Ok(code == 200),
            Err(s3::error::S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Err(e) => Err(backend_err(e)),
        }
    }

    async fn remove(&self, path: &str) -> Result<bool, StorageError> {
        let path = validate_object_path(path)?;
        if !self.exists(path).await? {
            return Ok(false);
        }
        self.bucket.delete_object(path).await.map_err(backend_err)?;
        Ok(true)
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<SignedUrl, StorageError> {
        let path = validate_object_path(path)?;
        let secs = u32::try_from(ttl.as_secs())
            .map_err(|_| StorageError::Signing("ttl too large for a presigned URL".into()))?;
        let url = self
            .bucket
            .presign_get(path, secs, None)
            .await
            .map_err(backend_err)?;
        let expires_at = Utc::now() + chrono::Duration::seconds(i64::from(secs));
        Ok(SignedUrl { url, expires_at })
    }
}
