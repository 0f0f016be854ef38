//! Remote auth operations
//!
//! Thin wrappers over `/api/auth/*`. Login and registration are credential
//! exchanges: they carry no stored token and a 401 from them means bad
//! credentials. A login's token pair is only persisted by `adopt`, together
//! with the user it belongs to. Fetching or updating the current user
//! refreshes the cached user record. Nothing here touches session state; that
//! is `SessionManager`'s job.

use std::sync::Arc;

use notes_auth::{
    AuthTokens, CHANGE_PASSWORD_PATH, CredentialPair, LOGIN_PATH, LoginRequest, ME_PATH,
    ProfileUpdate, REGISTER_PATH, RegisterRequest, TokenStore, User,
};
use notes_client::{ApiClient, Method, Result};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Serialize)]
struct PasswordChange<'a> {
    current_password: &'a str,
    new_password: &'a str,
}

/// Auth endpoints of the API.
#[derive(Clone)]
pub struct AuthApi {
    client: Arc<ApiClient>,
}

impl AuthApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    fn store(&self) -> &TokenStore {
        self.client.token_store()
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, request: &RegisterRequest) -> Result<User> {
        self.client.post_public(REGISTER_PATH, request).await
    }

    /// Exchange credentials for a token pair. Nothing is stored.
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthTokens> {
        let tokens: AuthTokens = self.client.post_public(LOGIN_PATH, request).await?;
        debug!(email = %request.email, "login accepted");
        Ok(tokens)
    }

    /// Fetch the user a freshly issued token pair belongs to, without
    /// touching the stored session.
    pub async fn user_for(&self, tokens: &AuthTokens) -> Result<User> {
        self.client.get_with_token(ME_PATH, &tokens.access_token).await
    }

    /// Persist a token pair and its user. If the user cannot be cached the
    /// previous session is put back.
    pub fn adopt(&self, tokens: AuthTokens, user: &User) -> Result<()> {
        let previous = (self.store().load(), self.store().load_user());
        self.store().save(&CredentialPair::from(tokens))?;
        if let Err(e) = self.store().save_user(user) {
            warn!(error = %e, "failed to cache user, restoring previous session");
            self.restore_stored(previous);
            return Err(e.into());
        }
        debug!(user_id = user.id, "session stored");
        Ok(())
    }

    // a failed save_user leaves the user key as it was; only the pair needs undoing
    fn restore_stored(&self, (pair, user): (Option<CredentialPair>, Option<User>)) {
        let restored = match pair {
            Some(pair) => self.store().save(&pair),
            None => self
                .store()
                .clear()
                .and_then(|()| user.map_or(Ok(()), |u| self.store().save_user(&u))),
        };
        if let Err(e) = restored {
            warn!(error = %e, "failed to restore previous session");
        }
    }

    /// Fetch the current user and refresh the cached copy.
    pub async fn current_user(&self) -> Result<User> {
        let user: User = self.client.get(ME_PATH).await?;
        self.store().save_user(&user)?;
        Ok(user)
    }

    /// Apply a partial profile update; the server's response replaces the cache.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        let user: User = self.client.put(ME_PATH, update).await?;
        self.store().save_user(&user)?;
        Ok(user)
    }

    pub async fn change_password(&self, current: &str, new: &str) -> Result<()> {
        let body = serde_json::to_value(PasswordChange {
            current_password: current,
            new_password: new,
        })
        .map_err(|e| notes_client::Error::InvalidRequest(format!("serializing body: {e}")))?;
        self.client.send(Method::POST, CHANGE_PASSWORD_PATH, Some(body)).await
    }

    /// Local-only: forget tokens and cached user.
    pub fn logout(&self) -> Result<()> {
        self.store().clear()?;
        Ok(())
    }

    /// True if anything (tokens or a cached user) is stored.
    pub fn has_stored_session(&self) -> bool {
        !self.store().is_empty()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store().has_access_token()
    }

    pub fn stored_user(&self) -> Option<User> {
        self.store().load_user()
    }
}
