//! Process-wide identity holder.
//!
//! A [`Session`] is constructed once, shared behind an `Arc`, and is the only
//! writer of the signed-in state. Observers read snapshots or subscribe to the
//! `watch` channel to re-evaluate route guards on every change.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use common::guard::{self, GuardDecision, GuardState, RouteRequirements};
use common::{Entitlement, UserRole};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::backend::{AuthBackend, AuthEvent, Identity};
use crate::error::ClientError;
use crate::types::{Profile, SignUpForm};

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    pub loading: bool,
    // Bumped on every identity change so stale background fetches can be dropped.
    revision: u64,
}

impl SessionState {
    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }

    pub fn role(&self) -> Option<UserRole> {
        self.profile.as_ref().map(|p| p.role)
    }

    pub fn entitlement(&self, now: DateTime<Utc>) -> Entitlement {
        Entitlement::evaluate(self.profile.as_ref(), now)
    }

    pub fn guard_state(&self) -> GuardState {
        GuardState {
            loading: self.loading,
            signed_in: self.is_signed_in(),
            role: self.role(),
            access_expiry: self.profile.as_ref().map(|p| p.access_expiry_date),
        }
    }

    fn set_signed_in(&mut self, identity: Identity, profile: Profile) {
        self.identity = Some(identity);
        self.profile = Some(profile);
        self.revision += 1;
    }

    fn clear(&mut self) {
        self.identity = None;
        self.profile = None;
        self.revision += 1;
    }
}

/// Where the caller should go after an auth operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    AdminHome,
    UserHome,
    Login,
}

impl Navigation {
    fn home_for(role: UserRole) -> Self {
        if role.is_admin() {
            Self::AdminHome
        } else {
            Self::UserHome
        }
    }
}

/// Sets `loading` for as long as it is alive.
struct LoadingGuard<'a>(&'a watch::Sender<SessionState>);

impl<'a> LoadingGuard<'a> {
    fn begin(state: &'a watch::Sender<SessionState>) -> Self {
        state.send_modify(|s| s.loading = true);
        Self(state)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|s| s.loading = false);
    }
}

pub struct Session {
    backend: Arc<dyn AuthBackend>,
    state: Arc<watch::Sender<SessionState>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// A holder in the loading state. Call [`Session::initialize`] before use.
    pub fn new(backend: Arc<dyn AuthBackend>) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState {
            loading: true,
            ..SessionState::default()
        });
        Arc::new(Self {
            backend,
            state: Arc::new(state),
            listener: Mutex::new(None),
        })
    }

    /// Restore any persisted session and start following backend auth events.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<(), ClientError> {
        let _loading = LoadingGuard::begin(&self.state);
        self.listen(self.backend.subscribe());

        let Some(identity) = self.backend.current_session().await? else {
            debug!("No persisted session");
            return Ok(());
        };
        match self.backend.fetch_profile(&identity).await {
            Ok(profile) => {
                info!(username = %identity.username, "Session restored");
                self.state
                    .send_modify(|s| s.set_signed_in(identity, profile));
                Ok(())
            }
            Err(ClientError::Unauthorized(reason)) => {
                debug!(%reason, "Persisted session was rejected");
                if let Err(e) = self.backend.sign_out().await {
                    warn!(error = %e, "Failed to discard rejected session");
                }
                self.state.send_modify(SessionState::clear);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Stop following backend events. Safe to call more than once.
    pub fn shutdown(&self) {
        let handle = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    fn listen(&self, mut events: broadcast::Receiver<AuthEvent>) {
        let state = Arc::clone(&self.state);
        let backend = Arc::clone(&self.backend);
        let handle = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auth event listener lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                // Events can trail the holder's own updates; the backend's
                // current credentials decide whether one still applies.
                let current = backend.authenticated_as();
                match event {
                    AuthEvent::SignedIn(identity) => {
                        if current.as_ref() != Some(&identity) {
                            continue;
                        }
                        let seen = {
                            let held = state.borrow();
                            if held.identity.as_ref() == Some(&identity) {
                                continue;
                            }
                            held.revision
                        };
                        match backend.fetch_profile(&identity).await {
                            Ok(profile) => {
                                state.send_if_modified(|s| {
                                    if s.revision != seen {
                                        return false;
                                    }
                                    s.set_signed_in(identity, profile);
                                    true
                                });
                            }
                            Err(e) => warn!(error = %e, "Failed to load profile after sign-in"),
                        }
                    }
                    AuthEvent::SignedOut | AuthEvent::TokenExpired => {
                        state.send_if_modified(|s| {
                            if s.identity.is_none() || s.identity == current {
                                return false;
                            }
                            s.clear();
                            true
                        });
                    }
                }
            }
        });

        let previous = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Navigation, ClientError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ClientError::InvalidInput(
                "Username and password are required".into(),
            ));
        }
        let _loading = LoadingGuard::begin(&self.state);

        let (identity, profile) = self.backend.sign_in(username, password).await?;
        let navigation = Navigation::home_for(profile.role);
        self.state
            .send_modify(|s| s.set_signed_in(identity, profile));
        Ok(navigation)
    }

    #[instrument(skip(self, form), fields(username = %form.username))]
    pub async fn sign_up(&self, form: &SignUpForm) -> Result<Navigation, ClientError> {
        if form.username.trim().is_empty() {
            return Err(ClientError::InvalidInput("Username is required".into()));
        }
        if form.password.len() < 6 {
            return Err(ClientError::InvalidInput(
                "Password must be at least 6 characters".into(),
            ));
        }
        if form.phone_number.trim().is_empty() {
            return Err(ClientError::InvalidInput("Phone number is required".into()));
        }
        let _loading = LoadingGuard::begin(&self.state);

        self.backend.sign_up(form).await?;
        Ok(Navigation::Login)
    }

    /// Signs out with the provider first; local state is kept if that fails.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<Navigation, ClientError> {
        let _loading = LoadingGuard::begin(&self.state);
        self.backend.sign_out().await?;
        self.state.send_modify(SessionState::clear);
        Ok(Navigation::Login)
    }

    pub async fn refresh_profile(&self) -> Result<Profile, ClientError> {
        let (identity, seen) = {
            let current = self.state.borrow();
            let identity = current
                .identity
                .clone()
                .ok_or_else(|| ClientError::Unauthorized("Not signed in".into()))?;
            (identity, current.revision)
        };
        let profile = self.backend.fetch_profile(&identity).await?;
        self.state.send_if_modified(|s| {
            if s.revision != seen {
                return false;
            }
            s.profile = Some(profile.clone());
            true
        });
        Ok(profile)
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Run the route guard against the current state.
    pub fn authorize(&self, requirements: &RouteRequirements, location: &str) -> GuardDecision {
        guard::evaluate(
            &self.state.borrow().guard_state(),
            requirements,
            location,
            Utc::now(),
        )
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
