use std::time::Duration;

use chrono::{DateTime, Utc};
use common::has_video;
use common::storage::VideoStore;
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use tracing::instrument;
use uuid::Uuid;

use crate::entity::chapter_progress;
use crate::error::AppError;
use crate::models::chapter::PlaybackResponse;
use crate::services::chapter::find_chapter;

/// Record that `user_id` watched `chapter_id` at `at`. One row per pair.
pub async fn record_progress<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    chapter_id: i32,
    at: DateTime<Utc>,
) -> Result<(), DbErr> {
    chapter_progress::Entity::insert(chapter_progress::ActiveModel {
        user_id: Set(user_id),
        chapter_id: Set(chapter_id),
        watched_at: Set(at),
    })
    .on_conflict(
        OnConflict::columns([
            chapter_progress::Column::UserId,
            chapter_progress::Column::ChapterId,
        ])
        .update_column(chapter_progress::Column::WatchedAt)
        .to_owned(),
    )
    .exec_without_returning(db)
    .await?;
    Ok(())
}

/// Issue a time-limited playback URL and record the watch event.
///
/// The caller must already have passed the entitlement check. A failed
/// progress write is logged; the URL is still returned.
#[instrument(skip(db, store))]
pub async fn request_playback<C: ConnectionTrait>(
    db: &C,
    store: &dyn VideoStore,
    user_id: Uuid,
    chapter_id: i32,
    ttl: Duration,
) -> Result<PlaybackResponse, AppError> {
    let chapter = find_chapter(db, chapter_id).await?;
    if !has_video(&chapter.video_storage_path) {
        return Err(AppError::NotFound(
            "No video has been uploaded for this chapter".into(),
        ));
    }

    let signed = store.signed_url(&chapter.video_storage_path, ttl).await?;

    if let Err(e) = record_progress(db, user_id, chapter_id, Utc::now()).await {
        tracing::warn!(%user_id, chapter_id, error = %e, "Failed to record chapter progress");
    }

    Ok(PlaybackResponse {
        chapter_id,
        url: signed.url,
        expires_at: signed.expires_at,
    })
}
