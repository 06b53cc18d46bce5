//! Time-bounded access entitlements.
//!
//! Nothing here caches: callers evaluate against the current instant on every
//! check because the clock advances and admins may move the expiry at any time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Anything carrying an access expiry timestamp.
pub trait AccessWindow {
    /// The instant after which access ends. `None` is treated as "not entitled".
    fn access_expiry(&self) -> Option<DateTime<Utc>>;
}

impl AccessWindow for DateTime<Utc> {
    fn access_expiry(&self) -> Option<DateTime<Utc>> {
        Some(*self)
    }
}

/// True iff a profile is present and its expiry is strictly after `now`.
pub fn is_entitled<P: AccessWindow + ?Sized>(profile: Option<&P>, now: DateTime<Utc>) -> bool {
    profile
        .and_then(|p| p.access_expiry())
        .is_some_and(|expiry| expiry > now)
}

/// Whole days of access left, rounded up and floored at zero.
pub fn remaining_days<P: AccessWindow + ?Sized>(profile: Option<&P>, now: DateTime<Utc>) -> i64 {
    let Some(expiry) = profile.and_then(|p| p.access_expiry()) else {
        return 0;
    };
    let left = (expiry - now).num_milliseconds();
    if left <= 0 {
        return 0;
    }
    // ceil for positive values
    (left + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
}

/// Snapshot of an entitlement evaluated at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Entitlement {
    /// Whether content may be streamed right now.
    pub entitled: bool,
    /// Days of access left (0 once expired).
    #[schema(example = 12)]
    pub remaining_days: i64,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Entitlement {
    pub fn evaluate<P: AccessWindow + ?Sized>(profile: Option<&P>, now: DateTime<Utc>) -> Self {
        Self {
            entitled: is_entitled(profile, now),
            remaining_days: remaining_days(profile, now),
            expires_at: profile.and_then(|p| p.access_expiry()),
        }
    }
}
