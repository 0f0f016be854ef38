//! Auth session manager
//!
//! Owns the client-side belief about who is logged in. State is published as
//! immutable `SessionSnapshot`s on a watch channel; front ends read the
//! current snapshot or subscribe to changes.
//!
//! Phases:
//! - `Anonymous`: no stored credentials
//! - `Restoring`: credentials and a cached user were found locally, the
//!   server has not confirmed them yet
//! - `Authenticating`: a login or registration is in flight
//! - `Authenticated`: the server returned the current user
//! - `Error`: the last login or registration failed; `error` holds the message
//!
//! Remote failures are recorded as a displayable message and then returned to
//! the caller. Only `logout` never fails.

use notes_auth::{LoginRequest, ProfileUpdate, RegisterRequest, User};
use notes_client::Result;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::auth_api::AuthApi;

pub const LOGIN_FAILED: &str = "Login failed";
pub const REGISTRATION_FAILED: &str = "Registration failed";
pub const FETCH_USER_FAILED: &str = "Failed to fetch user";
pub const UPDATE_FAILED: &str = "Update failed";
pub const PASSWORD_CHANGE_FAILED: &str = "Password change failed";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Anonymous,
    Restoring,
    Authenticating,
    Authenticated,
    Error,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Anonymous => "anonymous",
            SessionPhase::Restoring => "restoring",
            SessionPhase::Authenticating => "authenticating",
            SessionPhase::Authenticated => "authenticated",
            SessionPhase::Error => "error",
        }
    }
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub user: Option<User>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl SessionSnapshot {
    /// True once the server has confirmed the session.
    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated
    }
}

pub struct SessionManager {
    api: AuthApi,
    state: watch::Sender<SessionSnapshot>,
}

impl SessionManager {
    pub fn new(api: AuthApi) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self { api, state }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// First phase of rehydration, no I/O: adopt whatever the token store holds.
    ///
    /// Returns true if a stored session was found and now needs `confirm`.
    pub fn restore(&self) -> bool {
        let restoring = self.api.is_authenticated();
        let user = if restoring { self.api.stored_user() } else { None };
        debug!(restoring, cached_user = user.is_some(), "session restored from store");
        self.state.send_modify(|s| {
            s.phase = if restoring {
                SessionPhase::Restoring
            } else {
                SessionPhase::Anonymous
            };
            s.user = user;
        });
        restoring
    }

    /// Second phase of rehydration: ask the server who we are.
    ///
    /// On failure the stored session is dropped and the manager returns to
    /// `Anonymous`; the error is returned but not recorded for display.
    pub async fn confirm(&self) -> Result<User> {
        match self.api.current_user().await {
            Ok(user) => {
                self.state.send_modify(|s| {
                    s.phase = SessionPhase::Authenticated;
                    s.user = Some(user.clone());
                });
                Ok(user)
            }
            Err(e) => {
                warn!(error = %e, "stored session rejected, signing out");
                self.reset();
                Err(e)
            }
        }
    }

    /// `restore` followed by `confirm` when there is something to confirm.
    pub async fn initialize(&self) -> SessionPhase {
        if self.restore() {
            // rejection is already reflected in the phase
            let _ = self.confirm().await;
        }
        self.state.borrow().phase
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<User> {
        self.begin(SessionPhase::Authenticating);
        match self.authenticate(request).await {
            Ok(user) => Ok(user),
            Err(e) => Err(self.fail_authentication(e, LOGIN_FAILED)),
        }
    }

    /// Create the account, then log in with the same credentials.
    ///
    /// Form validation (password confirmation, length, terms) belongs to the
    /// caller; see `validation::validate_registration`.
    pub async fn register(&self, request: &RegisterRequest) -> Result<User> {
        self.begin(SessionPhase::Authenticating);
        let result = match self.api.register(request).await {
            Ok(created) => {
                debug!(user_id = created.id, "account created, logging in");
                self.authenticate(&request.login_request()).await
            }
            Err(e) => Err(e),
        };
        result.map_err(|e| self.fail_authentication(e, REGISTRATION_FAILED))
    }

    /// Local-only. Idempotent: an anonymous manager with an empty store is left
    /// untouched and subscribers are not notified.
    pub fn logout(&self) {
        if self.api.has_stored_session()
            && let Err(e) = self.api.logout()
        {
            warn!(error = %e, "failed to clear stored session");
        }
        let changed = self.state.send_if_modified(|s| {
            if *s == SessionSnapshot::default() {
                return false;
            }
            *s = SessionSnapshot::default();
            true
        });
        if changed {
            info!("logged out");
        }
    }

    /// Refetch the current user. A failure records the message and ends the session.
    pub async fn fetch_current_user(&self) -> Result<User> {
        self.begin_loading();
        match self.api.current_user().await {
            Ok(user) => {
                self.state.send_modify(|s| {
                    s.phase = SessionPhase::Authenticated;
                    s.user = Some(user.clone());
                    s.is_loading = false;
                });
                Ok(user)
            }
            Err(e) => {
                let message = e.user_message(FETCH_USER_FAILED);
                if let Err(clear_err) = self.api.logout() {
                    warn!(error = %clear_err, "failed to clear stored session");
                }
                self.state.send_replace(SessionSnapshot {
                    error: Some(message),
                    ..SessionSnapshot::default()
                });
                Err(e)
            }
        }
    }

    /// Apply a partial profile update. The server's response replaces the user;
    /// nothing is applied before it arrives.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        self.begin_loading();
        match self.api.update_profile(update).await {
            Ok(user) => {
                self.state.send_modify(|s| {
                    s.user = Some(user.clone());
                    s.is_loading = false;
                });
                Ok(user)
            }
            Err(e) => Err(self.record(e, UPDATE_FAILED)),
        }
    }

    pub async fn change_password(&self, current: &str, new: &str) -> Result<()> {
        self.begin_loading();
        match self.api.change_password(current, new).await {
            Ok(()) => {
                self.state.send_modify(|s| s.is_loading = false);
                Ok(())
            }
            Err(e) => Err(self.record(e, PASSWORD_CHANGE_FAILED)),
        }
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.error.take().is_some());
    }

    // login, then fetch the user with the new token; nothing is stored until both succeed
    async fn authenticate(&self, request: &LoginRequest) -> Result<User> {
        let tokens = self.api.login(request).await?;
        let user = self.api.user_for(&tokens).await?;
        self.api.adopt(tokens, &user)?;
        info!(user_id = user.id, "authenticated");
        self.state.send_modify(|s| {
            s.phase = SessionPhase::Authenticated;
            s.user = Some(user.clone());
            s.is_loading = false;
            s.error = None;
        });
        Ok(user)
    }

    fn begin(&self, phase: SessionPhase) {
        self.state.send_modify(|s| {
            s.phase = phase;
            s.is_loading = true;
            s.error = None;
        });
    }

    fn begin_loading(&self) {
        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });
    }

    fn fail_authentication(&self, e: notes_client::Error, default: &str) -> notes_client::Error {
        let message = e.user_message(default);
        warn!(error = %e, "authentication failed");
        self.state.send_modify(|s| {
            s.phase = SessionPhase::Error;
            s.is_loading = false;
            s.error = Some(message);
        });
        e
    }

    fn record(&self, e: notes_client::Error, default: &str) -> notes_client::Error {
        let message = e.user_message(default);
        self.state.send_modify(|s| {
            s.is_loading = false;
            s.error = Some(message);
        });
        e
    }

    fn reset(&self) {
        if let Err(e) = self.api.logout() {
            warn!(error = %e, "failed to clear stored session");
        }
        self.state.send_replace(SessionSnapshot::default());
    }
}
