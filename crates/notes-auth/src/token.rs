//! Bearer credentials and the token refresh call
//!
//! `refresh_tokens` talks to `POST /api/auth/refresh` directly with a plain
//! `reqwest::Client`. It is deliberately not routed through the interceptor
//! pipeline: a refresh that fails with 401 must surface as a failure, not
//! trigger another refresh.

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::REFRESH_PATH;
use crate::error::{Error, Result};

/// Token payload returned by login and refresh.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".into()
}

/// The access/refresh pair as held by the token store.
///
/// Both halves are always present together; the store never hands out a
/// pair with only one side populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access: Secret<String>,
    pub refresh: Secret<String>,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: Secret::new(access.into()),
            refresh: Secret::new(refresh.into()),
        }
    }
}

impl From<AuthTokens> for CredentialPair {
    fn from(tokens: AuthTokens) -> Self {
        Self::new(tokens.access_token, tokens.refresh_token)
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshEnvelope {
    data: AuthTokens,
}

/// Exchange a refresh token for a new access/refresh pair.
///
/// 401/403 from the endpoint means the refresh token is revoked or expired
/// and maps to `InvalidCredentials`; anything else non-2xx maps to `Refresh`.
pub async fn refresh_tokens(
    client: &reqwest::Client,
    base_url: &str,
    refresh: &str,
) -> Result<AuthTokens> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), REFRESH_PATH);
    let response = client
        .post(&url)
        .json(&RefreshRequest {
            refresh_token: refresh,
        })
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::Refresh(format!(
            "refresh endpoint returned {status}: {body}"
        )));
    }

    let envelope = response
        .json::<RefreshEnvelope>()
        .await
        .map_err(|e| Error::Refresh(format!("invalid refresh response: {e}")))?;
    debug!("token refresh succeeded");
    Ok(envelope.data)
}
