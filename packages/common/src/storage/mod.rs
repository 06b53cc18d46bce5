mod error;
mod path;
mod signing;
mod traits;

pub mod filesystem;
#[cfg(feature = "object-storage")]
pub mod s3;

pub use error::StorageError;
pub use filesystem::FilesystemVideoStore;
pub use path::{chapter_video_path, is_video_content_type, validate_object_path};
pub use signing::MediaSigner;
pub use traits::{BoxReader, SignedUrl, VideoStore};
#[cfg(feature = "object-storage")]
pub use s3::S3VideoStore;

/// Route under which the server streams filesystem-backed objects.
pub const MEDIA_ROUTE_PREFIX: &str = "/api/v1/media";
