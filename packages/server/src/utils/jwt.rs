use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT Claims structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Username
    pub uid: Uuid,   // Profile ID
    pub jti: Uuid,   // Session ID
    pub exp: usize,  // Expiration timestamp
}

/// A freshly issued token together with its session bookkeeping.
pub struct IssuedToken {
    pub token: String,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Sign a new JWT token for a profile, bound to a new session id.
pub fn sign(profile_id: Uuid, username: &str, ttl_hours: i64, secret: &str) -> Result<IssuedToken> {
    let expires_at = Utc::now()
        .checked_add_signed(Duration::hours(ttl_hours))
        .context("token lifetime overflows the clock")?;
    let session_id = Uuid::now_v7();

    let claims = Claims {
        sub: username.to_owned(),
        uid: profile_id,
        jti: session_id,
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(IssuedToken {
        token,
        session_id,
        expires_at,
    })
}

/// Verify and decode a JWT token.
pub fn verify(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}
