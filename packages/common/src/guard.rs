//! Route gating shared by the HTTP extractors and the client session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entitlement::is_entitled;
use crate::role::UserRole;

/// What a route demands beyond an authenticated identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteRequirements {
    pub require_admin: bool,
    pub require_entitlement: bool,
}

impl RouteRequirements {
    pub const AUTHENTICATED: Self = Self {
        require_admin: false,
        require_entitlement: false,
    };
    pub const ADMIN: Self = Self {
        require_admin: true,
        require_entitlement: false,
    };
    pub const ENTITLED: Self = Self {
        require_admin: false,
        require_entitlement: true,
    };
}

/// The parts of the session state the guard looks at.
///
/// `role` and `access_expiry` are `None` while the identity is known but its
/// profile has not been loaded (or failed to load).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardState {
    pub loading: bool,
    pub signed_in: bool,
    pub role: Option<UserRole>,
    pub access_expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Render the protected content.
    Allow,
    /// Session state is still settling; show a neutral indicator, decide later.
    Pending,
    /// No identity. `return_to` is the originally requested location.
    RedirectLogin { return_to: String },
    /// Authenticated but not an admin.
    RedirectDashboard,
    /// Authenticated but the entitlement has lapsed.
    RedirectExpired,
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decide what happens to a navigation attempt to `location`.
///
/// Checks run in a fixed order: loading, identity, role, entitlement.
pub fn evaluate(
    state: &GuardState,
    requirements: &RouteRequirements,
    location: &str,
    now: DateTime<Utc>,
) -> GuardDecision {
    if state.loading {
        return GuardDecision::Pending;
    }
    if !state.signed_in {
        return GuardDecision::RedirectLogin {
            return_to: location.to_string(),
        };
    }
    if requirements.require_admin && !state.role.is_some_and(|r| r.is_admin()) {
        return GuardDecision::RedirectDashboard;
    }
    if requirements.require_entitlement && !is_entitled(state.access_expiry.as_ref(), now) {
        return GuardDecision::RedirectExpired;
    }
    GuardDecision::Allow
}
