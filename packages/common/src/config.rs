use std::path::PathBuf;

use serde::Deserialize;

/// Which object-storage backend holds chapter videos.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    S3,
}

/// S3-compatible bucket settings. Only read when `backend = "s3"`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct S3Config {
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    /// Custom endpoint (MinIO, R2, ...). Empty means AWS.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub path_style: bool,
}

/// App-level video storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Directory for the filesystem backend. Default: "./data/videos".
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Largest accepted video in bytes. Default: 2 GiB.
    #[serde(default = "default_max_video_size")]
    pub max_video_size: u64,
    /// Lifetime of playback URLs. Default: 3600.
    #[serde(default = "default_signed_url_ttl_secs")]
    pub signed_url_ttl_secs: u64,
    /// Externally reachable base URL used to build filesystem playback links.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default)]
    pub s3: S3Config,
}

fn default_root() -> PathBuf {
    PathBuf::from("./data/videos")
}
fn default_max_video_size() -> u64 {
    2 * 1024 * 1024 * 1024
}
fn default_signed_url_ttl_secs() -> u64 {
    3600
}
fn default_public_base_url() -> String {
    "http://127.0.0.1:3000".into()
}
fn default_s3_region() -> String {
    "us-east-1".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root: default_root(),
            max_video_size: default_max_video_size(),
            signed_url_ttl_secs: default_signed_url_ttl_secs(),
            public_base_url: default_public_base_url(),
            s3: S3Config::default(),
        }
    }
}
