use std::sync::Arc;

use common::storage::{MediaSigner, VideoStore};
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub videos: Arc<dyn VideoStore>,
    /// Verifies playback tokens on the media route (filesystem backend).
    pub media_signer: MediaSigner,
}
