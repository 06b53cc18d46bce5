use chrono::{DateTime, Duration, Utc};
use common::UserRole;
use sea_orm::*;
use tracing::instrument;
use uuid::Uuid;

use crate::config::{AccessConfig, AuthConfig};
use crate::entity::{chapter_progress, profile, session};
use crate::error::AppError;
use crate::models::shared::normalize_optional;
use crate::utils::{hash, jwt};

/// Everything needed to create a profile.
pub struct NewProfile {
    pub username: String,
    pub password: String,
    pub phone_number: String,
    pub role: UserRole,
    pub access_expiry_date: DateTime<Utc>,
    pub school: Option<String>,
    pub college: Option<String>,
    pub major: Option<String>,
    pub grade_year: Option<String>,
}

/// A successful login.
pub struct SignedIn {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub profile: profile::Model,
}

/// Expiry for an account granted `days` of access starting now.
pub fn grant_from_now(days: i64) -> DateTime<Utc> {
    let now = Utc::now();
    now.checked_add_signed(Duration::days(days)).unwrap_or(now)
}

pub async fn find_profile<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<profile::Model, AppError> {
    profile::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

pub async fn find_by_username<C: ConnectionTrait>(
    db: &C,
    username: &str,
) -> Result<Option<profile::Model>, AppError> {
    Ok(profile::Entity::find()
        .filter(profile::Column::Username.eq(username))
        .one(db)
        .await?)
}

/// Insert a new profile. `UsernameTaken` if the name is in use.
#[instrument(skip(db, new), fields(username = %new.username, role = %new.role))]
pub async fn create_profile<C: ConnectionTrait>(
    db: &C,
    new: NewProfile,
) -> Result<profile::Model, AppError> {
    let username = new.username.trim().to_string();
    if find_by_username(db, &username).await?.is_some() {
        return Err(AppError::UsernameTaken);
    }

    let password = hash::hash_password(&new.password)
        .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))?;

    let now = Utc::now();
    let model = profile::ActiveModel {
        id: Set(Uuid::now_v7()),
        username: Set(username),
        password: Set(password),
        role: Set(new.role),
        access_expiry_date: Set(new.access_expiry_date),
        phone_number: Set(new.phone_number.trim().to_string()),
        school: Set(normalize_optional(new.school)),
        college: Set(normalize_optional(new.college)),
        major: Set(normalize_optional(new.major)),
        grade_year: Set(normalize_optional(new.grade_year)),
        created_at: Set(now),
        updated_at: Set(now),
    };

    model.insert(db).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            tracing::debug!("Registration race condition: unique constraint caught on insert");
            AppError::UsernameTaken
        }
        _ => AppError::from(e),
    })
}

/// Self-registration: a regular user with the configured starting grant.
pub async fn register<C: ConnectionTrait>(
    db: &C,
    access: &AccessConfig,
    mut new: NewProfile,
) -> Result<profile::Model, AppError> {
    new.role = UserRole::User;
    new.access_expiry_date = grant_from_now(access.signup_grant_days);
    create_profile(db, new).await
}

/// Check credentials and open a session.
///
/// An unknown username is `NotFound`; a wrong password is `InvalidCredentials`.
#[instrument(skip(db, auth, password))]
pub async fn login<C: ConnectionTrait>(
    db: &C,
    auth: &AuthConfig,
    username: &str,
    password: &str,
) -> Result<SignedIn, AppError> {
    let profile = find_by_username(db, username.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("No account with that username".into()))?;

    let is_valid = hash::verify_password(password, &profile.password)
        .map_err(|e| AppError::Internal(format!("Password verify error: {}", e)))?;
    if !is_valid {
        return Err(AppError::InvalidCredentials);
    }

    let issued = jwt::sign(
        profile.id,
        &profile.username,
        auth.token_ttl_hours,
        &auth.jwt_secret,
    )
    .map_err(|e| AppError::Internal(format!("JWT sign error: {}", e)))?;

    session::ActiveModel {
        id: Set(issued.session_id),
        profile_id: Set(profile.id),
        created_at: Set(Utc::now()),
        expires_at: Set(issued.expires_at),
    }
    .insert(db)
    .await?;

    tracing::info!(profile_id = %profile.id, "Signed in");
    Ok(SignedIn {
        token: issued.token,
        expires_at: issued.expires_at,
        profile,
    })
}

/// Revoke one session.
pub async fn logout<C: ConnectionTrait>(db: &C, session_id: Uuid) -> Result<(), AppError> {
    session::Entity::delete_by_id(session_id).exec(db).await?;
    Ok(())
}

/// Replace a password and revoke every session of the profile.
#[instrument(skip(db, password))]
pub async fn reset_password<C>(db: &C, id: Uuid, password: &str) -> Result<(), AppError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let hashed = hash::hash_password(password)
        .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))?;

    let txn = db.begin().await?;
    let existing = find_profile(&txn, id).await?;
    let mut active: profile::ActiveModel = existing.into();
    active.password = Set(hashed);
    active.updated_at = Set(Utc::now());
    active.update(&txn).await?;

    session::Entity::delete_many()
        .filter(session::Column::ProfileId.eq(id))
        .exec(&txn)
        .await?;
    txn.commit().await?;
    Ok(())
}

/// Delete a profile with its sessions and watch history.
#[instrument(skip(db))]
pub async fn delete_profile<C>(db: &C, id: Uuid) -> Result<(), AppError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    find_profile(&txn, id).await?;

    session::Entity::delete_many()
        .filter(session::Column::ProfileId.eq(id))
        .exec(&txn)
        .await?;
    chapter_progress::Entity::delete_many()
        .filter(chapter_progress::Column::UserId.eq(id))
        .exec(&txn)
        .await?;
    profile::Entity::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;
    Ok(())
}
