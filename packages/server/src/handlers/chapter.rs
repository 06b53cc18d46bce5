use std::time::Duration;

use axum::{
    Json,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use common::storage::BoxReader;
use sea_orm::*;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

use crate::entity::{chapter, course};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AdminUser, AuthUser, EntitledUser};
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::chapter::{
    ChapterListQuery, ChapterListResponse, ChapterResponse, CreateChapterRequest,
    MoveChapterRequest, PlaybackResponse, UpdateChapterRequest, validate_create_chapter,
    validate_update_chapter,
};
use crate::models::shared::{Pagination, contains_any, page_window};
use crate::services::chapter::{self as chapters, NewChapter};
use crate::services::{playback, video};
use crate::state::AppState;

/// Body limit for video uploads: the configured maximum plus multipart overhead.
pub fn video_body_limit(max_video_size: u64) -> DefaultBodyLimit {
    let limit = usize::try_from(max_video_size.saturating_add(64 * 1024)).unwrap_or(usize::MAX);
    DefaultBodyLimit::max(limit)
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Chapters",
    operation_id = "listChapters",
    summary = "List chapters",
    description = "Paginated chapter list in display order (course, position, id). Filter by `course_id`, by `subject_id` (chapters of any course under the subject) and by a case-insensitive `search` over title and description.",
    params(ChapterListQuery),
    responses(
        (status = 200, description = "Chapters", body = ChapterListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user, query))]
pub async fn list_chapters(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ChapterListQuery>,
) -> Result<Json<ChapterListResponse>, AppError> {
    let (page, per_page) = page_window(query.page, query.per_page);

    let mut select = chapter::Entity::find();
    if let Some(cond) = contains_any(
        query.search.as_deref(),
        &[chapter::Column::Title, chapter::Column::Description],
    ) {
        select = select.filter(cond);
    }
    if let Some(course_id) = query.course_id {
        select = select.filter(chapter::Column::CourseId.eq(course_id));
    }
    if let Some(subject_id) = query.subject_id {
        select = select.filter(
            chapter::Column::CourseId.in_subquery(
                course::Entity::find()
                    .select_only()
                    .column(course::Column::Id)
                    .filter(course::Column::SubjectId.eq(subject_id))
                    .into_query(),
            ),
        );
    }

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;

    let data = select
        .order_by_asc(chapter::Column::CourseId)
        .order_by_asc(chapter::Column::OrderInCourse)
        .order_by_asc(chapter::Column::Id)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?
        .into_iter()
        .map(ChapterResponse::from)
        .collect();

    Ok(Json(ChapterListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Chapters",
    operation_id = "getChapter",
    summary = "Get a chapter",
    params(("id" = i32, Path, description = "Chapter ID")),
    responses(
        (status = 200, description = "Chapter", body = ChapterResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_chapter(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ChapterResponse>, AppError> {
    let model = chapters::find_chapter(&state.db, id).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Chapters",
    operation_id = "createChapter",
    summary = "Create a chapter",
    description = "Creates a chapter without a video. Without `order_in_course` it is appended after the course's last chapter (0 for an empty course). An explicit order already used in the course is a CONFLICT.",
    request_body = CreateChapterRequest,
    responses(
        (status = 201, description = "Chapter created", body = ChapterResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Course not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Order already used (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, admin, payload), fields(admin_id = %admin.profile_id, course_id = payload.course_id))]
pub async fn create_chapter(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateChapterRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_chapter(&payload)?;

    let model = chapters::append(
        &state.db,
        NewChapter {
            course_id: payload.course_id,
            title: payload.title,
            description: payload.description,
            order_in_course: payload.order_in_course,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(ChapterResponse::from(model))))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Chapters",
    operation_id = "updateChapter",
    summary = "Edit a chapter",
    description = "Partial update. A new `course_id` moves the chapter and keeps its position; no chapters are renumbered.",
    params(("id" = i32, Path, description = "Chapter ID")),
    request_body = UpdateChapterRequest,
    responses(
        (status = 200, description = "Chapter updated", body = ChapterResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Chapter or course not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Order already used (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, admin, payload), fields(admin_id = %admin.profile_id))]
pub async fn update_chapter(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateChapterRequest>,
) -> Result<Json<ChapterResponse>, AppError> {
    validate_update_chapter(&payload)?;
    let model = chapters::update(&state.db, id, payload).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Chapters",
    operation_id = "deleteChapter",
    summary = "Delete a chapter",
    description = "Deletes the chapter with its watch history. The stored video is removed afterwards; a failed removal is logged and does not fail the request.",
    params(("id" = i32, Path, description = "Chapter ID")),
    responses(
        (status = 204, description = "Chapter deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, admin), fields(admin_id = %admin.profile_id))]
pub async fn delete_chapter(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    chapters::delete(&state.db, &*state.videos, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{id}/move",
    tag = "Chapters",
    operation_id = "moveChapter",
    summary = "Move a chapter up or down",
    description = "Swaps the chapter with its neighbour in display order. Moving the first chapter up or the last one down changes nothing. Returns the course's chapters in their new order.",
    params(("id" = i32, Path, description = "Chapter ID")),
    request_body = MoveChapterRequest,
    responses(
        (status = 200, description = "Chapters of the course in display order", body = Vec<ChapterResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, admin, payload), fields(admin_id = %admin.profile_id, direction = ?payload.direction))]
pub async fn move_chapter(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<MoveChapterRequest>,
) -> Result<Json<Vec<ChapterResponse>>, AppError> {
    let ordered = chapters::swap(&state.db, id, payload.direction).await?;
    Ok(Json(ordered.into_iter().map(ChapterResponse::from).collect()))
}

#[utoipa::path(
    put,
    path = "/{id}/video",
    tag = "Chapters",
    operation_id = "uploadChapterVideo",
    summary = "Upload or replace a chapter's video",
    description = "Multipart form with one `file` field. The part's media type (or, failing that, one guessed from its filename) must be `video/*`. The previous video, if any, is removed once the new one is bound.",
    params(("id" = i32, Path, description = "Chapter ID")),
    request_body(content_type = "multipart/form-data", content = String, description = "Form with a `file` field"),
    responses(
        (status = 200, description = "Chapter with its new video", body = ChapterResponse),
        (status = 400, description = "Not a video, missing file or too large (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Storage failure (DEPENDENCY_FAILURE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, admin, multipart), fields(admin_id = %admin.profile_id))]
pub async fn upload_video(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<ChapterResponse>, AppError> {
    chapters::find_chapter(&state.db, id).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .map(str::to_string)
            .filter(|ct| ct != "application/octet-stream")
            .or_else(|| {
                filename
                    .as_deref()
                    .and_then(|name| mime_guess::from_path(name).first())
                    .map(|m| m.to_string())
            })
            .ok_or_else(|| AppError::Validation("Cannot determine the file's media type".into()))?;
        video::ensure_video_type(&content_type)?;

        let model = spool_and_upload(
            field,
            &state,
            id,
            filename.as_deref(),
            &content_type,
        )
        .await?;
        return Ok(Json(model.into()));
    }

    Err(AppError::Validation("Missing 'file' field".into()))
}

/// Spool a multipart field to a temp file, then hand it to the video store.
async fn spool_and_upload(
    mut field: axum::extract::multipart::Field<'_>,
    state: &AppState,
    chapter_id: i32,
    filename: Option<&str>,
    content_type: &str,
) -> Result<chapter::Model, AppError> {
    let max_size = state.config.storage.max_video_size;
    let temp_path = std::env::temp_dir().join(format!("lectern-upload-{}", Uuid::new_v4()));

    let result = async {
        let mut temp_file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create temp file: {e}")))?;

        let mut total_size: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::Validation(format!("Upload read error: {e}")))?
        {
            total_size += chunk.len() as u64;
            if total_size > max_size {
                return Err(AppError::Validation(format!(
                    "Video exceeds maximum size of {max_size} bytes"
                )));
            }
            temp_file
                .write_all(&chunk)
                .await
                .map_err(|e| AppError::Internal(format!("Temp file write failed: {e}")))?;
        }
        if total_size == 0 {
            return Err(AppError::Validation("Uploaded file is empty".into()));
        }

        temp_file
            .flush()
            .await
            .map_err(|e| AppError::Internal(format!("Temp file flush failed: {e}")))?;
        drop(temp_file);

        let file = tokio::fs::File::open(&temp_path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to reopen temp file: {e}")))?;
        let reader: BoxReader = Box::new(file);
        video::upload(
            &state.db,
            &*state.videos,
            chapter_id,
            filename,
            content_type,
            reader,
        )
        .await
    }
    .await;

    // Best effort.
    let _ = tokio::fs::remove_file(&temp_path).await;

    result
}

#[utoipa::path(
    post,
    path = "/{id}/playback",
    tag = "Chapters",
    operation_id = "requestPlayback",
    summary = "Get a playback URL",
    description = "Requires an open access window, for admins too. Returns a time-limited URL for the chapter's video and records the watch event. A chapter without a video is NOT_FOUND.",
    params(("id" = i32, Path, description = "Chapter ID")),
    responses(
        (status = 200, description = "Playback URL", body = PlaybackResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Access window closed (ACCESS_EXPIRED)", body = ErrorBody),
        (status = 404, description = "Chapter or video not found (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Storage failure (DEPENDENCY_FAILURE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, user), fields(profile_id = %user.profile_id))]
pub async fn request_playback(
    EntitledUser(user): EntitledUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<PlaybackResponse>, AppError> {
    let ttl = Duration::from_secs(state.config.storage.signed_url_ttl_secs);
    let response =
        playback::request_playback(&state.db, &*state.videos, user.profile_id, id, ttl).await?;
    Ok(Json(response))
}
