//! Authentication collaborator used by [`crate::session::Session`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::types::{Profile, SignUpForm};

/// The authenticated principal, independent of its profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    /// When the bearer token stops being accepted.
    pub expires_at: DateTime<Utc>,
}

/// Changes in authentication state pushed by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Identity),
    SignedOut,
    TokenExpired,
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// The persisted session, if one is still usable.
    async fn current_session(&self) -> Result<Option<Identity>, ClientError>;

    /// Authenticate by username. `NotFound` when no profile owns the username.
    ///
    /// Returns the profile the provider authenticated, so credentials are
    /// only committed together with it.
    async fn sign_in(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(Identity, Profile), ClientError>;

    /// Register a new account. Does not authenticate.
    async fn sign_up(&self, form: &SignUpForm) -> Result<(), ClientError>;

    /// Revoke the current session with the provider.
    async fn sign_out(&self) -> Result<(), ClientError>;

    async fn fetch_profile(&self, identity: &Identity) -> Result<Profile, ClientError>;

    /// The identity the provider currently holds credentials for. No I/O.
    fn authenticated_as(&self) -> Option<Identity>;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    token: String,
    identity: Identity,
}

/// Persists the bearer token between CLI invocations.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `{config_dir}/lectern/session.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("lectern").join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Option<StoredSession> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(stored) => Some(stored),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable session file");
                None
            }
        }
    }

    fn save(&self, stored: &StoredSession) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(internal)?;
        }
        let raw = serde_json::to_string_pretty(stored).map_err(internal)?;
        std::fs::write(&self.path, raw).map_err(internal)
    }

    fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove session file"),
        }
    }
}

fn internal(err: impl std::fmt::Display) -> ClientError {
    ClientError::Internal(err.to_string())
}

/// [`AuthBackend`] backed by the Lectern server.
pub struct HttpBackend {
    api: Arc<ApiClient>,
    store: TokenStore,
    identity: RwLock<Option<Identity>>,
}

impl HttpBackend {
    pub fn new(api: Arc<ApiClient>, store: TokenStore) -> Self {
        Self {
            api,
            store,
            identity: RwLock::new(None),
        }
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    fn remember(&self, identity: Option<Identity>) {
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = identity;
    }

    fn forget(&self) {
        self.api.set_token(None);
        self.remember(None);
        self.store.clear();
    }
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn current_session(&self) -> Result<Option<Identity>, ClientError> {
        let Some(stored) = self.store.load() else {
            return Ok(None);
        };
        if stored.identity.expires_at <= Utc::now() {
            debug!("Persisted session has expired");
            self.store.clear();
            return Ok(None);
        }
        self.api.set_token(Some(stored.token));
        self.remember(Some(stored.identity.clone()));
        Ok(Some(stored.identity))
    }

    async fn sign_in(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(Identity, Profile), ClientError> {
        let login = self.api.login(username, password).await?;
        let identity = Identity {
            user_id: login.profile.id,
            username: login.profile.username.clone(),
            expires_at: login.expires_at,
        };
        self.store.save(&StoredSession {
            token: login.token.clone(),
            identity: identity.clone(),
        })?;
        self.api.set_token(Some(login.token));
        self.remember(Some(identity.clone()));
        let _ = self.api.events().send(AuthEvent::SignedIn(identity.clone()));
        Ok((identity, login.profile))
    }

    async fn sign_up(&self, form: &SignUpForm) -> Result<(), ClientError> {
        self.api.register(form).await?;
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ClientError> {
        if self.api.has_token() {
            match self.api.logout().await {
                // Already revoked server-side counts as signed out.
                Ok(()) | Err(ClientError::Unauthorized(_)) => {}
                Err(e) => return Err(e),
            }
        }
        self.forget();
        let _ = self.api.events().send(AuthEvent::SignedOut);
        Ok(())
    }

    async fn fetch_profile(&self, identity: &Identity) -> Result<Profile, ClientError> {
        let me = self.api.me().await?;
        if me.profile.id != identity.user_id {
            return Err(ClientError::Unauthorized(
                "Session belongs to a different account".into(),
            ));
        }
        Ok(me.profile)
    }

    fn authenticated_as(&self) -> Option<Identity> {
        // A rejected token is dropped by the API client.
        if !self.api.has_token() {
            return None;
        }
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.api.events().subscribe()
    }
}
