use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use common::has_video;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{chapter_progress, course};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AdminUser, AuthUser};
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::chapter::ChapterSummary;
use crate::models::course::{
    CourseDetailResponse, CourseListQuery, CourseListResponse, CourseResponse,
    CreateCourseRequest, UpdateCourseRequest, validate_create_course, validate_update_course,
};
use crate::models::shared::{Pagination, contains_any, page_window};
use crate::services::{catalog, chapter as chapters};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Courses",
    operation_id = "listCourses",
    summary = "List courses",
    description = "Paginated course list, newest first. `search` matches title, description or keywords case-insensitively; `subject_id` restricts to one subject.",
    params(CourseListQuery),
    responses(
        (status = 200, description = "Courses", body = CourseListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user, query))]
pub async fn list_courses(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<CourseListQuery>,
) -> Result<Json<CourseListResponse>, AppError> {
    let (page, per_page) = page_window(query.page, query.per_page);

    let mut select = course::Entity::find();
    if let Some(cond) = contains_any(
        query.search.as_deref(),
        &[
            course::Column::Title,
            course::Column::Description,
            course::Column::Keywords,
        ],
    ) {
        select = select.filter(cond);
    }
    if let Some(subject_id) = query.subject_id {
        select = select.filter(course::Column::SubjectId.eq(subject_id));
    }

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;

    let data = select
        .order_by_desc(course::Column::CreatedAt)
        .order_by_desc(course::Column::Id)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?
        .into_iter()
        .map(CourseResponse::from)
        .collect();

    Ok(Json(CourseListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Courses",
    operation_id = "getCourse",
    summary = "Get a course with its chapters",
    description = "Returns the course, its subject name and its chapters in display order. Each chapter carries the caller's last watch time, if any.",
    params(("id" = i32, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course detail", body = CourseDetailResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(profile_id = %auth_user.profile_id))]
pub async fn get_course(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<CourseDetailResponse>, AppError> {
    let course = catalog::find_course(&state.db, id).await?;
    let subject = catalog::find_subject(&state.db, course.subject_id).await?;
    let rows = chapters::list_in_course(&state.db, id).await?;

    let ids: Vec<i32> = rows.iter().map(|c| c.id).collect();
    let watched: HashMap<i32, _> = if ids.is_empty() {
        HashMap::new()
    } else {
        chapter_progress::Entity::find()
            .filter(chapter_progress::Column::UserId.eq(auth_user.profile_id))
            .filter(chapter_progress::Column::ChapterId.is_in(ids))
            .all(&state.db)
            .await?
            .into_iter()
            .map(|p| (p.chapter_id, p.watched_at))
            .collect()
    };

    let chapters = rows
        .into_iter()
        .map(|c| ChapterSummary {
            watched_at: watched.get(&c.id).copied(),
            has_video: has_video(&c.video_storage_path),
            id: c.id,
            title: c.title,
            description: c.description,
            order_in_course: c.order_in_course,
        })
        .collect();

    Ok(Json(CourseDetailResponse {
        course: course.into(),
        subject_name: subject.name,
        chapters,
    }))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Courses",
    operation_id = "createCourse",
    summary = "Create a course",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Course created", body = CourseResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Subject not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, admin, payload), fields(admin_id = %admin.profile_id))]
pub async fn create_course(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_course(&payload)?;
    let model = catalog::create_course(&state.db, admin.profile_id, payload).await?;
    Ok((StatusCode::CREATED, Json(CourseResponse::from(model))))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Courses",
    operation_id = "updateCourse",
    summary = "Edit a course",
    description = "Partial update. Setting `subject_id` moves the course to another subject.",
    params(("id" = i32, Path, description = "Course ID")),
    request_body = UpdateCourseRequest,
    responses(
        (status = 200, description = "Course updated", body = CourseResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Course or subject not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, admin, payload), fields(admin_id = %admin.profile_id))]
pub async fn update_course(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateCourseRequest>,
) -> Result<Json<CourseResponse>, AppError> {
    validate_update_course(&payload)?;
    let model = catalog::update_course(&state.db, id, payload).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Courses",
    operation_id = "deleteCourse",
    summary = "Delete a course",
    description = "Refused with CONFLICT while the course still has chapters.",
    params(("id" = i32, Path, description = "Course ID")),
    responses(
        (status = 204, description = "Course deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Course still has chapters (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, admin), fields(admin_id = %admin.profile_id))]
pub async fn delete_course(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    catalog::delete_course(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
