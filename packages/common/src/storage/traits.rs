use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use super::error::StorageError;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// A time-limited URL granting read access to one stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Path-addressed storage for chapter videos.
///
/// Writes to an existing path replace the previous object.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Store bytes under `path` and return the number of bytes written.
    async fn put(&self, path: &str, content_type: &str, data: &[u8]) -> Result<u64, StorageError> {
        let reader: BoxReader = Box::new(Cursor::new(data.to_vec()));
        self.put_stream(path, content_type, reader).await
    }

    /// Store data from an async reader. Nothing is visible under `path` unless
    /// the whole stream was accepted.
    async fn put_stream(
        &self,
        path: &str,
        content_type: &str,
        reader: BoxReader,
    ) -> Result<u64, StorageError>;

    /// Open an object for streaming.
    async fn open(&self, path: &str) -> Result<BoxReader, StorageError>;

    /// Check whether an object exists.
    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Delete an object.
    ///
    /// Returns `true` if the object was deleted, `false` if it did not exist.
    async fn remove(&self, path: &str) -> Result<bool, StorageError>;

    /// Produce a URL that grants read access to `path` for `ttl`.
    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<SignedUrl, StorageError>;
}
