use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

use super::MEDIA_ROUTE_PREFIX;
use super::error::StorageError;
use super::path::validate_object_path;
use super::signing::MediaSigner;
use super::traits::{BoxReader, SignedUrl, VideoStore};

/// Filesystem-backed video store.
///
/// Objects live directly under `{base_path}/{path}`. Writes go to
/// `{base_path}/.tmp` first and are renamed into place once complete.
/// Playback links point at the server's media route and carry a token from
/// [`MediaSigner`].
pub struct FilesystemVideoStore {
    base_path: PathBuf,
    max_size: u64,
    public_base_url: String,
    signer: MediaSigner,
}

impl FilesystemVideoStore {
    /// Create a new filesystem video store.
    pub async fn new(
        base_path: PathBuf,
        max_size: u64,
        public_base_url: impl Into<String>,
        signer: MediaSigner,
    ) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            max_size,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            signer,
        })
    }

    pub fn signer(&self) -> &MediaSigner {
        &self.signer
    }

    fn object_path(&self, path: &str) -> Result<PathBuf, StorageError> {
        Ok(self.base_path.join(validate_object_path(path)?))
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    /// Copy `reader` into `temp_path`, enforcing the size limit. The caller
    /// owns cleanup of `temp_path` on error.
    async fn spool(&self, reader: &mut BoxReader, temp_path: &Path) -> Result<u64, StorageError> {
        let mut buf = vec![0u8; 64 * 1024]; // 64KB read buffer
        let mut temp_file = fs::File::create(temp_path).await?;
        let mut total_bytes: u64 = 0;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            total_bytes += n as u64;
            if total_bytes > self.max_size {
                return Err(StorageError::SizeLimitExceeded {
                    actual: total_bytes,
                    limit: self.max_size,
                });
            }
            temp_file.write_all(&buf[..n]).await?;
        }

        temp_file.flush().await?;
        Ok(total_bytes)
    }
}

#[async_trait]
impl VideoStore for FilesystemVideoStore {
    async fn put_stream(
        &self,
        path: &str,
        _content_type: &str,
        mut reader: BoxReader,
    ) -> Result<u64, StorageError> {
        let object_path = self.object_path(path)?;
        let temp_path = self.temp_path();

        let total_bytes = match self.spool(&mut reader, &temp_path).await {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&temp_path, &object_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(total_bytes)
    }

    async fn open(&self, path: &str) -> Result<BoxReader, StorageError> {
        let object_path = self.object_path(path)?;
        match fs::File::open(&object_path).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let object_path = self.object_path(path)?;
        Ok(fs::try_exists(&object_path).await?)
    }

    async fn remove(&self, path: &str) -> Result<bool, StorageError> {
        let object_path = self.object_path(path)?;
        match fs::remove_file(&object_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<SignedUrl, StorageError> {
        if !self.exists(path).await? {
            return Err(StorageError::NotFound(path.to_string()));
        }
        let (token, expires_at) = self.signer.sign(path, ttl)?;
        Ok(SignedUrl {
            url: format!(
                "{}{MEDIA_ROUTE_PREFIX}/{path}?token={token}",
                self.public_base_url
            ),
            expires_at,
        })
    }
}
