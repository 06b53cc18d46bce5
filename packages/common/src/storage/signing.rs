use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::error::StorageError;

#[derive(Debug, Serialize, Deserialize)]
struct MediaClaims {
    sub: String, // Object path
    exp: usize,
}

/// Issues and checks short-lived tokens that grant read access to one object.
#[derive(Clone)]
pub struct MediaSigner {
    secret: Vec<u8>,
}

impl MediaSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Sign `path` for `ttl`, returning the token and its expiry.
    pub fn sign(&self, path: &str, ttl: Duration) -> Result<(String, DateTime<Utc>), StorageError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StorageError::Signing(format!("invalid ttl: {e}")))?;
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| StorageError::Signing("ttl overflows the clock".into()))?;

        let claims = MediaClaims {
            sub: path.to_owned(),
            exp: expires_at.timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| StorageError::Signing(e.to_string()))?;

        Ok((token, expires_at))
    }

    /// Accept `token` only if it is unexpired and was issued for `path`.
    pub fn verify(&self, token: &str, path: &str) -> Result<(), StorageError> {
        let data = decode::<MediaClaims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &Validation::default(),
        )
        .map_err(|e| StorageError::Signing(e.to_string()))?;

        if data.claims.sub != path {
            return Err(StorageError::Signing("token was issued for another object".into()));
        }
        Ok(())
    }
}
