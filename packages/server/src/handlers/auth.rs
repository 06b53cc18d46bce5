use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use common::{Entitlement, UserRole};
use sea_orm::*;
use tracing::instrument;

use crate::entity::profile;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::auth::{
    LoginRequest, LoginResponse, MeResponse, ProfileResponse, RegisterRequest, UpdateMeRequest,
    validate_login_request, validate_register_request, validate_update_me,
};
use crate::models::shared::normalize_optional;
use crate::services::account::{self, NewProfile};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/register",
    tag = "Auth",
    operation_id = "register",
    summary = "Register a new account",
    description = "Creates a regular user account. The account starts with `access.signup_grant_days` of access (0 by default, so an admin must extend it). Does not sign the user in.",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = ProfileResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Username taken (USERNAME_TAKEN)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_register_request(&payload)?;

    let profile = account::register(
        &state.db,
        &state.config.access,
        NewProfile {
            username: payload.username,
            password: payload.password,
            phone_number: payload.phone_number,
            role: UserRole::User,
            access_expiry_date: Utc::now(),
            school: payload.school,
            college: payload.college,
            major: payload.major,
            grade_year: payload.grade_year,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(ProfileResponse::from(profile))))
}

#[utoipa::path(
    post,
    path = "/login",
    tag = "Auth",
    operation_id = "login",
    summary = "Sign in with username and password",
    description = "Opens a session and returns a bearer token. An unknown username is reported as NOT_FOUND, a wrong password as INVALID_CREDENTIALS.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Wrong password (INVALID_CREDENTIALS)", body = ErrorBody),
        (status = 404, description = "Unknown username (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    validate_login_request(&payload)?;

    let signed_in = account::login(
        &state.db,
        &state.config.auth,
        &payload.username,
        &payload.password,
    )
    .await?;

    Ok(Json(LoginResponse {
        token: signed_in.token,
        expires_at: signed_in.expires_at,
        profile: signed_in.profile.into(),
    }))
}

#[utoipa::path(
    post,
    path = "/logout",
    tag = "Auth",
    operation_id = "logout",
    summary = "Sign out",
    description = "Revokes the session behind the presented token. The token is rejected afterwards.",
    responses(
        (status = 204, description = "Signed out"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(profile_id = %auth_user.profile_id))]
pub async fn logout(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    account::logout(&state.db, auth_user.session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/me",
    tag = "Auth",
    operation_id = "getMe",
    summary = "Current profile and entitlement",
    description = "Returns the caller's profile and an entitlement summary evaluated at request time.",
    responses(
        (status = 200, description = "Current profile", body = MeResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(profile_id = %auth_user.profile_id))]
pub async fn me(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MeResponse>, AppError> {
    let profile = account::find_profile(&state.db, auth_user.profile_id).await?;
    Ok(Json(MeResponse {
        entitlement: Entitlement::evaluate(Some(&profile), Utc::now()),
        profile: profile.into(),
    }))
}

#[utoipa::path(
    patch,
    path = "/me",
    tag = "Auth",
    operation_id = "updateMe",
    summary = "Edit own profile",
    description = "Updates contact and affiliation fields. Username, role and access expiry can only be changed by an admin.",
    request_body = UpdateMeRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(profile_id = %auth_user.profile_id))]
pub async fn update_me(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdateMeRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    validate_update_me(&payload)?;

    let existing = account::find_profile(&state.db, auth_user.profile_id).await?;
    if payload == UpdateMeRequest::default() {
        return Ok(Json(existing.into()));
    }

    let mut active: profile::ActiveModel = existing.into();
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
