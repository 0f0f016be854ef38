//! Request interceptor pipeline
//!
//! Outbound: attach the stored access token as a bearer credential.
//! Inbound: pass 2xx through; on 401 run at most one refresh-and-retry per
//! logical request; pass every other status through to the caller.
//!
//! Requests that do not use the stored token (`RequestAuth::Public` for
//! credential exchanges, `RequestAuth::Bearer` for a token not yet persisted)
//! are never refreshed: their 401 goes straight back to the caller.
//!
//! The retry policy lives in `on_response`, a pure function of the response
//! status and the request's attempt counter, so it can be tested without a
//! server. `AuthInterceptor::recover` performs the side effects of a refresh.
//!
//! Concurrent 401s are coalesced: the refresh runs under a lock, and a waiter
//! that finds the stored access token already replaced (by the refresh it was
//! queued behind) retries with that token instead of refreshing again.

use std::sync::Arc;

use notes_auth::{CredentialPair, TokenStore};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::metrics;
use crate::navigator::Navigator;
use crate::transport::Transport;

/// Resubmissions allowed per logical request after an authorization failure.
pub const MAX_AUTH_RETRIES: u32 = 1;

/// Which credential a request carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestAuth {
    /// The token store's access token, with refresh-and-retry on 401
    #[default]
    Stored,
    /// No credential; a 401 means the request itself was rejected
    Public,
    /// This exact token, no refresh
    Bearer(String),
}

/// Per-request state threaded through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Correlation id sent as `x-request-id` on every attempt
    pub request_id: String,
    /// Number of times this request has already been resubmitted
    pub attempt: u32,
    pub auth: RequestAuth,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::with_auth(RequestAuth::Stored)
    }

    pub fn with_auth(auth: RequestAuth) -> Self {
        Self {
            request_id: format!("req_{}", uuid::Uuid::new_v4().as_simple()),
            attempt: 0,
            auth,
        }
    }

    /// Context for the resubmission of this request.
    pub fn next_attempt(&self) -> Self {
        Self {
            request_id: self.request_id.clone(),
            attempt: self.attempt + 1,
            auth: self.auth.clone(),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// What the pipeline does with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundAction {
    /// 2xx: hand the response to the caller unchanged
    Deliver,
    /// 401 on a first attempt with the stored token: refresh, then resubmit once
    RefreshAndRetry,
    /// Anything else: surface the failure as-is
    Propagate,
}

/// Decide what to do with a response. Pure function: no I/O.
pub fn on_response(status: u16, context: &RequestContext) -> InboundAction {
    match status {
        200..=299 => InboundAction::Deliver,
        401 if context.auth == RequestAuth::Stored && context.attempt < MAX_AUTH_RETRIES => {
            InboundAction::RefreshAndRetry
        }
        _ => InboundAction::Propagate,
    }
}

/// `Bearer <token>` header value.
pub fn bearer(token: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| Error::InvalidRequest(format!("invalid token value: {e}")))
}

/// Result of a recovery attempt after a 401.
#[derive(Debug)]
pub enum Recovery {
    /// Resubmit the request with this access token
    Retry(String),
    /// Nothing to refresh with; surface the original 401
    GiveUp,
}

/// Token-aware half of the pipeline.
pub struct AuthInterceptor {
    transport: Transport,
    store: TokenStore,
    navigator: Arc<dyn Navigator>,
    refresh_lock: Mutex<()>,
}

impl AuthInterceptor {
    pub fn new(transport: Transport, store: TokenStore, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            transport,
            store,
            navigator,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Outbound phase: attach the stored access token, if any.
    ///
    /// Returns the token that was attached so a later 401 can tell whether
    /// someone else already refreshed it.
    pub fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(reqwest::RequestBuilder, Option<String>)> {
        match self.store.access_token() {
            Some(token) => {
                let value = bearer(&token)?;
                Ok((request.header(AUTHORIZATION, value), Some(token)))
            }
            None => Ok((request, None)),
        }
    }

    /// Refresh the session after a 401.
    ///
    /// `stale` is the access token the failed request carried. On refresh
    /// failure the stored session is cleared, the navigator is sent to the
    /// login entry point, and `SessionExpired` is returned. If the refreshed
    /// pair cannot be persisted the request is not retried and `Storage` is
    /// returned.
    pub async fn recover(&self, stale: Option<&str>) -> Result<Recovery> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.store.access_token();
        if let (Some(stale), Some(current)) = (stale, current.as_deref())
            && stale != current
        {
            debug!("access token already refreshed by a concurrent request, joining");
            metrics::record_refresh("joined");
            return Ok(Recovery::Retry(current.to_string()));
        }

        let Some(refresh) = self.store.refresh_token() else {
            debug!("no refresh token stored, giving up on 401");
            metrics::record_refresh("no_refresh_token");
            return Ok(Recovery::GiveUp);
        };

        let refreshed =
            notes_auth::refresh_tokens(self.transport.client(), self.transport.base_url(), &refresh)
                .await;
        match refreshed {
            Ok(tokens) => {
                let access = tokens.access_token.clone();
                if let Err(e) = self.store.save(&CredentialPair::from(tokens)) {
                    warn!(error = %e, "failed to persist refreshed tokens");
                    metrics::record_refresh("persist_failure");
                    return Err(Error::Storage(e));
                }
                metrics::record_refresh("success");
                info!("access token refreshed");
                Ok(Recovery::Retry(access))
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, ending session");
                metrics::record_refresh("failure");
                if let Err(clear_err) = self.store.clear() {
                    warn!(error = %clear_err, "failed to clear stored session");
                }
                self.navigator.redirect_to_login();
                Err(Error::SessionExpired(e.to_string()))
            }
        }
    }
}
