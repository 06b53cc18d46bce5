use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};
use common::guard::{self, GuardDecision, GuardState, RouteRequirements};
use common::UserRole;
use sea_orm::EntityTrait;
use uuid::Uuid;

use crate::entity::{profile, session};
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt;

/// Authenticated user extracted from the `Authorization: Bearer <token>` header.
///
/// The token must be valid and its session row must still exist. Role and
/// expiry are read from the profile on every request, so admin edits take
/// effect immediately.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub profile_id: Uuid,
    pub session_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub access_expiry: DateTime<Utc>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn guard_state(&self) -> GuardState {
        GuardState {
            loading: false,
            signed_in: true,
            role: Some(self.role),
            access_expiry: Some(self.access_expiry),
        }
    }

    /// Run the route guard for `requirements` and turn redirects into errors.
    pub fn require(&self, requirements: &RouteRequirements, location: &str) -> Result<(), AppError> {
        decision_to_result(guard::evaluate(
            &self.guard_state(),
            requirements,
            location,
            Utc::now(),
        ))
    }

    /// Returns `Ok(())` for admins, `Err(PermissionDenied)` otherwise.
    pub fn require_admin(&self) -> Result<(), AppError> {
        self.require(&RouteRequirements::ADMIN, "")
    }
}

fn decision_to_result(decision: GuardDecision) -> Result<(), AppError> {
    match decision {
        GuardDecision::Allow => Ok(()),
        GuardDecision::RedirectLogin { .. } => Err(AppError::TokenMissing),
        GuardDecision::RedirectDashboard => Err(AppError::PermissionDenied),
        GuardDecision::RedirectExpired => Err(AppError::AccessExpired),
        GuardDecision::Pending => Err(AppError::Internal(
            "route guard undecided for a settled request".into(),
        )),
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::TokenMissing)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::TokenInvalid)?;

        let claims = jwt::verify(token, &state.config.auth.jwt_secret)
            .map_err(|_| AppError::TokenInvalid)?;

        let session = session::Entity::find_by_id(claims.jti)
            .one(&state.db)
            .await?
            .ok_or(AppError::TokenInvalid)?;
        if session.profile_id != claims.uid || session.expires_at <= Utc::now() {
            return Err(AppError::TokenInvalid);
        }

        let profile = profile::Entity::find_by_id(claims.uid)
            .one(&state.db)
            .await?
            .ok_or(AppError::TokenInvalid)?;

        Ok(AuthUser {
            profile_id: profile.id,
            session_id: session.id,
            username: profile.username,
            role: profile.role,
            access_expiry: profile.access_expiry_date,
        })
    }
}

/// An [`AuthUser`] that passed the admin check.
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.require(&RouteRequirements::ADMIN, parts.uri.path())?;
        Ok(AdminUser(user))
    }
}

/// An [`AuthUser`] whose access window is still open.
pub struct EntitledUser(pub AuthUser);

impl FromRequestParts<AppState> for EntitledUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.require(&RouteRequirements::ENTITLED, parts.uri.path())?;
        Ok(EntitledUser(user))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn user(role: UserRole, expiry_offset_days: i64) -> AuthUser {
        AuthUser {
            profile_id: Uuid::now_v7(),
            session_id: Uuid::now_v7(),
            username: "alice".into(),
            role,
            access_expiry: Utc::now() + Duration::days(expiry_offset_days),
        }
    }

    #[test]
    fn non_admin_is_denied_admin_routes() {
        let err = user(UserRole::User, 10).require_admin().unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied));
        assert!(user(UserRole::Admin, -10).require_admin().is_ok());
    }

    #[test]
    fn expired_user_is_denied_entitled_routes() {
        let err = user(UserRole::User, -1)
            .require(&RouteRequirements::ENTITLED, "/play")
            .unwrap_err();
        assert!(matches!(err, AppError::AccessExpired));
        assert!(
            user(UserRole::User, 1)
                .require(&RouteRequirements::ENTITLED, "/play")
                .is_ok()
        );
    }
}
