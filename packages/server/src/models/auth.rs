use chrono::{DateTime, Utc};
use common::{Entitlement, UserRole};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

use super::shared::{double_option, validate_optional_text, validate_required};

const PROFILE_FIELD_MAX: usize = 128;

/// Request body for self-registration.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    /// Unique username (1-32 chars, letters, digits and underscores). Immutable.
    #[schema(example = "alice_wonder")]
    pub username: String,
    /// Password (6-128 characters).
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
    #[schema(example = "13800000000")]
    pub phone_number: String,
    pub school: Option<String>,
    pub college: Option<String>,
    pub major: Option<String>,
    pub grade_year: Option<String>,
}

pub fn validate_username(username: &str) -> Result<(), AppError> {
    let username = username.trim();
    if username.is_empty() || username.chars().count() > 32 {
        return Err(AppError::Validation(
            "Username must be 1-32 characters".into(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AppError::Validation(
            "Username must contain only letters, digits, and underscores".into(),
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.len() < 6 || password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be 6-128 characters".into(),
        ));
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<(), AppError> {
    validate_required(phone, "Phone number", 32)
}

/// Shared checks for the optional affiliation fields.
pub fn validate_affiliation(
    school: Option<&str>,
    college: Option<&str>,
    major: Option<&str>,
    grade_year: Option<&str>,
) -> Result<(), AppError> {
    validate_optional_text(school, "School", PROFILE_FIELD_MAX)?;
    validate_optional_text(college, "College", PROFILE_FIELD_MAX)?;
    validate_optional_text(major, "Major", PROFILE_FIELD_MAX)?;
    validate_optional_text(grade_year, "Grade year", PROFILE_FIELD_MAX)
}

pub fn validate_register_request(payload: &RegisterRequest) -> Result<(), AppError> {
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

/// Request body for login.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    #[schema(example = "alice_wonder")]
    pub username: String,
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
}

pub fn validate_login_request(payload: &LoginRequest) -> Result<(), AppError> {
    if payload.username.trim().is_empty() {
        return Err(AppError::Validation("Username must not be empty".into()));
    }
    if payload.password.is_empty() {
        return Err(AppError::Validation("Password must not be empty".into()));
    }
    Ok(())
}

/// A profile as seen over the API. The password hash is never included.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ProfileResponse {
    pub id: Uuid,
    #[schema(example = "alice_wonder")]
    pub username: String,
    pub role: UserRole,
    pub access_expiry_date: DateTime<Utc>,
    pub phone_number: String,
    pub school: Option<String>,
    pub college: Option<String>,
    pub major: Option<String>,
    pub grade_year: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<crate::entity::profile::Model> for ProfileResponse {
    fn from(m: crate::entity::profile::Model) -> Self {
        Self {
            id: m.id,
            username: m.username,
            role: m.role,
            access_expiry_date: m.access_expiry_date,
            phone_number: m.phone_number,
            school: m.school,
            college: m.college,
            major: m.major,
            grade_year: m.grade_year,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Successful login response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    /// Bearer token. Valid until `expires_at` or until logout.
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub profile: ProfileResponse,
}

/// Current profile plus its entitlement, evaluated at request time.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MeResponse {
    pub profile: ProfileResponse,
    pub entitlement: Entitlement,
}

/// Self-service profile edit. Username, role and expiry are not editable here.
#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateMeRequest {
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

pub fn validate_update_me(payload: &UpdateMeRequest) -> Result<(), AppError> {
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
