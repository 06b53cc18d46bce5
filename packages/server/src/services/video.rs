use chrono::{DateTime, Utc};
use common::storage::{BoxReader, VideoStore, chapter_video_path, is_video_content_type};
use sea_orm::prelude::Expr;
use sea_orm::*;
use tracing::instrument;

use crate::entity::chapter;
use crate::error::AppError;
use crate::services::chapter::{find_chapter, remove_video_best_effort};

/// Reject anything that is not a `video/*` media type.
pub fn ensure_video_type(content_type: &str) -> Result<(), AppError> {
    if is_video_content_type(content_type) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Only video files can be uploaded (got '{content_type}')"
        )))
    }
}

/// How often a bind is retried when another upload rebinds the chapter first.
const BIND_ATTEMPTS: usize = 3;

/// Store a chapter's video and bind it to the chapter.
///
/// The new path is bound only after the object is fully stored; if binding
/// fails the new object is removed. The object the bind actually replaced,
/// if any, is removed best-effort once the new one is bound.
#[instrument(skip(db, store, reader))]
pub async fn upload<C: ConnectionTrait>(
    db: &C,
    store: &dyn VideoStore,
    chapter_id: i32,
    filename: Option<&str>,
    content_type: &str,
    reader: BoxReader,
) -> Result<chapter::Model, AppError> {
    ensure_video_type(content_type)?;
    find_chapter(db, chapter_id).await?;

    let now = Utc::now();
    let path = chapter_video_path(chapter_id, now, filename, content_type);
    let size = store.put_stream(&path, content_type, reader).await?;
    tracing::info!(path, size, "Stored chapter video");

    let replaced = match bind(db, chapter_id, &path, now).await {
        Ok(replaced) => replaced,
        Err(e) => {
            remove_video_best_effort(store, &path).await;
            return Err(e);
        }
    };

    if replaced.video_storage_path != path {
        remove_video_best_effort(store, &replaced.video_storage_path).await;
    }

    Ok(chapter::Model {
        video_storage_path: path,
        updated_at: now,
        ..replaced
    })
}

/// Point the chapter at `path`, returning the row as it was just before.
///
/// The update only applies while the chapter still holds the path read
/// here, so two overlapping uploads each see the object they replaced.
async fn bind<C: ConnectionTrait>(
    db: &C,
    chapter_id: i32,
    path: &str,
    now: DateTime<Utc>,
) -> Result<chapter::Model, AppError> {
    for _ in 0..BIND_ATTEMPTS {
        let current = find_chapter(db, chapter_id).await?;
        let res = chapter::Entity::update_many()
            .col_expr(chapter::Column::VideoStoragePath, Expr::value(path))
            .col_expr(chapter::Column::UpdatedAt, Expr::value(now))
            .filter(chapter::Column::Id.eq(chapter_id))
            .filter(chapter::Column::VideoStoragePath.eq(current.video_storage_path.as_str()))
            .exec(db)
            .await?;
        if res.rows_affected == 1 {
            return Ok(current);
        }
        tracing::debug!(chapter_id, "Chapter video changed during upload, rebinding");
    }
    Err(AppError::Conflict(
        "The chapter's video kept changing, try the upload again".into(),
    ))
}
