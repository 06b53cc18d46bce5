use chrono::{DateTime, Utc};
use common::UserRole;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub use super::auth::ProfileResponse;
use super::auth::{validate_affiliation, validate_password, validate_phone, validate_username};
use super::shared::{Pagination, double_option};

/// Admin request to create an account.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "bob")]
    pub username: String,
    pub password: String,
    pub phone_number: String,
    /// Defaults to `user`.
    pub role: Option<UserRole>,
    /// Defaults to now + `access.admin_grant_days`.
    pub access_expiry_date: Option<DateTime<Utc>>,
    pub school: Option<String>,
    pub college: Option<String>,
    pub major: Option<String>,
    pub grade_year: Option<String>,
}

pub fn validate_create_user(payload: &CreateUserRequest) -> Result<(), AppError> {
    validate_username(&payload.username)?;
    validate_password(&payload.password)?;
    validate_phone(&payload.phone_number)?;
    validate_affiliation(
        payload.school.as_deref(),
        payload.college.as_deref(),
        payload.major.as_deref(),
        payload.grade_year.as_deref(),
    )
}

/// Admin edit of an account. The username is immutable.
#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateUserRequest {
    pub role: Option<UserRole>,
    pub access_expiry_date: Option<DateTime<Utc>>,
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub school: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub college: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub major: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub grade_year: Option<Option<String>>,
}

pub fn validate_update_user(payload: &UpdateUserRequest) -> Result<(), AppError> {
    if let Some(ref phone) = payload.phone_number {
        validate_phone(phone)?;
    }
    validate_affiliation(
        payload.school.as_ref().and_then(|v| v.as_deref()),
        payload.college.as_ref().and_then(|v| v.as_deref()),
        payload.major.as_ref().and_then(|v| v.as_deref()),
        payload.grade_year.as_ref().and_then(|v| v.as_deref()),
    )
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ResetPasswordRequest {
    pub password: String,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct UserListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Case-insensitive match on username, phone number or school.
    pub search: Option<String>,
    pub role: Option<UserRole>,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct UserListResponse {
    pub data: Vec<ProfileResponse>,
    pub pagination: Pagination,
}
