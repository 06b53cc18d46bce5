use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::*;
use tracing::instrument;

use crate::entity::subject;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AdminUser, AuthUser};
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::shared::{Pagination, contains_any, page_window};
use crate::models::subject::{
    CreateSubjectRequest, SubjectListQuery, SubjectListResponse, SubjectResponse,
    UpdateSubjectRequest, validate_create_subject, validate_update_subject,
};
use crate::services::catalog;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Subjects",
    operation_id = "listSubjects",
    summary = "List subjects",
    description = "Paginated subject list ordered by name. `search` matches name or description case-insensitively.",
    params(SubjectListQuery),
    responses(
        (status = 200, description = "Subjects", body = SubjectListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user, query))]
pub async fn list_subjects(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<SubjectListQuery>,
) -> Result<Json<SubjectListResponse>, AppError> {
    let (page, per_page) = page_window(query.page, query.per_page);

    let mut select = subject::Entity::find();
    if let Some(cond) = contains_any(
        query.search.as_deref(),
        &[subject::Column::Name, subject::Column::Description],
    ) {
        select = select.filter(cond);
    }

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;

    let data = select
        .order_by_asc(subject::Column::Name)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?
        .into_iter()
        .map(SubjectResponse::from)
        .collect();

    Ok(Json(SubjectListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Subjects",
    operation_id = "getSubject",
    summary = "Get a subject",
    params(("id" = i32, Path, description = "Subject ID")),
    responses(
        (status = 200, description = "Subject", body = SubjectResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_subject(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SubjectResponse>, AppError> {
    let model = catalog::find_subject(&state.db, id).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Subjects",
    operation_id = "createSubject",
    summary = "Create a subject",
    request_body = CreateSubjectRequest,
    responses(
        (status = 201, description = "Subject created", body = SubjectResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 409, description = "Name already used (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, admin, payload), fields(admin_id = %admin.profile_id))]
pub async fn create_subject(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateSubjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_subject(&payload)?;
    let model = catalog::create_subject(&state.db, payload).await?;
    Ok((StatusCode::CREATED, Json(SubjectResponse::from(model))))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Subjects",
    operation_id = "updateSubject",
    summary = "Edit a subject",
    params(("id" = i32, Path, description = "Subject ID")),
    request_body = UpdateSubjectRequest,
    responses(
        (status = 200, description = "Subject updated", body = SubjectResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Name already used (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, admin, payload), fields(admin_id = %admin.profile_id))]
pub async fn update_subject(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateSubjectRequest>,
) -> Result<Json<SubjectResponse>, AppError> {
    validate_update_subject(&payload)?;
    let model = catalog::update_subject(&state.db, id, payload).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Subjects",
    operation_id = "deleteSubject",
    summary = "Delete a subject",
    description = "Refused with CONFLICT while any course still belongs to the subject.",
    params(("id" = i32, Path, description = "Subject ID")),
    responses(
        (status = 204, description = "Subject deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Subject still has courses (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, admin), fields(admin_id = %admin.profile_id))]
pub async fn delete_subject(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    catalog::delete_subject(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
