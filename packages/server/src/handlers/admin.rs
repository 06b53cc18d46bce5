use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use common::UserRole;
use sea_orm::*;
use tracing::instrument;
use uuid::Uuid;

use crate::entity::{chapter, course, profile, subject};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AdminUser;
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::auth::validate_password;
use crate::models::dashboard::AdminStatsResponse;
use crate::models::shared::{Pagination, contains_any, normalize_optional, page_window};
use crate::models::user::{
    CreateUserRequest, ProfileResponse, ResetPasswordRequest, UpdateUserRequest, UserListQuery,
    UserListResponse, validate_create_user, validate_update_user,
};
use crate::services::account::{self, NewProfile, grant_from_now};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/users",
    tag = "Admin",
    operation_id = "listUsers",
    summary = "List accounts",
    description = "Paginated account list, newest first. `search` matches username, phone number or school case-insensitively.",
    params(UserListQuery),
    responses(
        (status = 200, description = "Accounts", body = UserListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _admin, query))]
pub async fn list_users(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<UserListQuery>,
) -> Result<Json<UserListResponse>, AppError> {
    let (page, per_page) = page_window(query.page, query.per_page);

    let mut select = profile::Entity::find();
    if let Some(cond) = contains_any(
        query.search.as_deref(),
        &[
            profile::Column::Username,
            profile::Column::PhoneNumber,
            profile::Column::School,
        ],
    ) {
        select = select.filter(cond);
    }
    if let Some(role) = query.role {
        select = select.filter(profile::Column::Role.eq(role));
    }

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;

    let data = select
        .order_by_desc(profile::Column::CreatedAt)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?
        .into_iter()
        .map(ProfileResponse::from)
        .collect();

    Ok(Json(UserListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Admin",
    operation_id = "createUser",
    summary = "Create an account",
    description = "Creates an account with any role. Without an explicit `access_expiry_date` the account gets `access.admin_grant_days` of access.",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = ProfileResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 409, description = "Username taken (USERNAME_TAKEN)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, admin, payload), fields(admin_id = %admin.profile_id, username = %payload.username))]
pub async fn create_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_user(&payload)?;

    let expiry = payload
        .access_expiry_date
        .unwrap_or_else(|| grant_from_now(state.config.access.admin_grant_days));

    let model = account::create_profile(
        &state.db,
        NewProfile {
            username: payload.username,
            password: payload.password,
            phone_number: payload.phone_number,
            role: payload.role.unwrap_or_default(),
            access_expiry_date: expiry,
            school: payload.school,
            college: payload.college,
            major: payload.major,
            grade_year: payload.grade_year,
        },
    )
    .await?;

    tracing::info!(profile_id = %model.id, "Account created by admin");
    Ok((StatusCode::CREATED, Json(ProfileResponse::from(model))))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Admin",
    operation_id = "getUser",
    summary = "Get an account",
    params(("id" = Uuid, Path, description = "Profile ID")),
    responses(
        (status = 200, description = "Account", body = ProfileResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _admin))]
pub async fn get_user(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProfileResponse>, AppError> {
    let model = account::find_profile(&state.db, id).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = "Admin",
    operation_id = "updateUser",
    summary = "Edit an account",
    description = "Partial update. This is how access windows are extended: set `access_expiry_date` to the new instant. Admins cannot demote themselves.",
    params(("id" = Uuid, Path, description = "Profile ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Account updated", body = ProfileResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, admin, payload), fields(admin_id = %admin.profile_id))]
pub async fn update_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    validate_update_user(&payload)?;
    if id == admin.profile_id && payload.role.is_some_and(|r| r != UserRole::Admin) {
        return Err(AppError::Validation(
            "Admins cannot remove their own admin role".into(),
        ));
    }

    let existing = account::find_profile(&state.db, id).await?;
    if payload == UpdateUserRequest::default() {
        return Ok(Json(existing.into()));
    }

    let mut active: profile::ActiveModel = existing.into();
    if let Some(role) = payload.role {
        active.role = Set(role);
    }
    if let Some(expiry) = payload.access_expiry_date {
        active.access_expiry_date = Set(expiry);
    }
    if let Some(phone) = payload.phone_number {
        active.phone_number = Set(phone.trim().to_string());
    }
    if let Some(school) = payload.school {
        active.school = Set(normalize_optional(school));
    }
    if let Some(college) = payload.college {
        active.college = Set(normalize_optional(college));
    }
    if let Some(major) = payload.major {
        active.major = Set(normalize_optional(major));
    }
    if let Some(grade_year) = payload.grade_year {
        active.grade_year = Set(normalize_optional(grade_year));
    }
    active.updated_at = Set(Utc::now());

    let model = active.update(&state.db).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Admin",
    operation_id = "deleteUser",
    summary = "Delete an account",
    description = "Deletes the account with its sessions and watch history. Admins cannot delete themselves.",
    params(("id" = Uuid, Path, description = "Profile ID")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 400, description = "Self-deletion (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, admin), fields(admin_id = %admin.profile_id))]
pub async fn delete_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if id == admin.profile_id {
        return Err(AppError::Validation("Admins cannot delete themselves".into()));
    }
    account::delete_profile(&state.db, id).await?;
    tracing::info!(profile_id = %id, "Account deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/users/{id}/password",
    tag = "Admin",
    operation_id = "resetUserPassword",
    summary = "Reset an account's password",
    description = "Replaces the password and signs the account out everywhere.",
    params(("id" = Uuid, Path, description = "Profile ID")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Password replaced"),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, admin, payload), fields(admin_id = %admin.profile_id))]
pub async fn reset_password(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> Result<StatusCode, AppError> {
    validate_password(&payload.password)?;
    account::reset_password(&state.db, id, &payload.password).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/stats",
    tag = "Admin",
    operation_id = "adminStats",
    summary = "Catalog and account counts",
    responses(
        (status = 200, description = "Counts", body = AdminStatsResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _admin))]
pub async fn stats(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<AdminStatsResponse>, AppError> {
    let db = &state.db;
    let user_count = profile::Entity::find().count(db).await?;
    let admin_count = profile::Entity::find()
        .filter(profile::Column::Role.eq(UserRole::Admin))
        .count(db)
        .await?;
    let expired_user_count = profile::Entity::find()
        .filter(profile::Column::Role.eq(UserRole::User))
        .filter(profile::Column::AccessExpiryDate.lte(Utc::now()))
        .count(db)
        .await?;

    Ok(Json(AdminStatsResponse {
        user_count,
        admin_count,
        expired_user_count,
        subject_count: subject::Entity::find().count(db).await?,
        course_count: course::Entity::find().count(db).await?,
        chapter_count: chapter::Entity::find().count(db).await?,
    }))
}
