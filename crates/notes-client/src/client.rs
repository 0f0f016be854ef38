//! Authenticated API client
//!
//! Runs every call through the interceptor pipeline and unwraps the
//! `{code, data, msg}` envelope. Callers see either the `data` payload or a
//! classified `Error`; a successful refresh-and-retry is invisible to them.
//!
//! Credential exchanges (login, registration) go out with `post_public`: no
//! stored token is attached and a 401 is returned as-is.

use std::sync::Arc;

use notes_auth::TokenStore;
use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::envelope::{ApiEnvelope, extract_message};
use crate::error::{Error, Result};
use crate::interceptor::{
    AuthInterceptor, InboundAction, Recovery, RequestAuth, RequestContext, bearer, on_response,
};
use crate::metrics;
use crate::navigator::Navigator;
use crate::transport::Transport;

/// Client for the BiliNote REST API.
pub struct ApiClient {
    transport: Transport,
    store: TokenStore,
    interceptor: AuthInterceptor,
}

impl ApiClient {
    pub fn new(transport: Transport, store: TokenStore, navigator: Arc<dyn Navigator>) -> Self {
        let interceptor = AuthInterceptor::new(transport.clone(), store.clone(), navigator);
        Self {
            transport,
            store,
            interceptor,
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(Method::GET, path, None).await
    }

    /// GET with an explicit access token instead of the stored one.
    pub async fn get_with_token<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<T> {
        let auth = RequestAuth::Bearer(token.to_string());
        self.execute_with(Method::GET, path, None, auth).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(Method::POST, path, Some(to_body(body)?)).await
    }

    /// POST without any credential and without refresh-and-retry.
    pub async fn post_public<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = Some(to_body(body)?);
        self.execute_with(Method::POST, path, body, RequestAuth::Public).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(Method::PUT, path, Some(to_body(body)?)).await
    }

    /// Issue a call whose response `data` is ignored (may be null).
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<()> {
        self.dispatch::<serde::de::IgnoredAny>(method, path, body, RequestAuth::Stored)
            .await
            .map(|_| ())
    }

    /// Issue a call and return the envelope's `data`, which must be present.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        self.execute_with(method, path, body, RequestAuth::Stored).await
    }

    pub async fn execute_with<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        auth: RequestAuth,
    ) -> Result<T> {
        let envelope = self.dispatch::<T>(method, path, body, auth).await?;
        envelope
            .data
            .ok_or_else(|| Error::Decode(format!("response for {path} has no data")))
    }

    #[instrument(skip_all, fields(method = %method, path = %path))]
    async fn dispatch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        auth: RequestAuth,
    ) -> Result<ApiEnvelope<T>> {
        let url = self.transport.url(path);
        let mut context = RequestContext::with_auth(auth);
        let mut retry_token: Option<String> = None;

        loop {
            let mut builder = self
                .transport
                .client()
                .request(method.clone(), &url)
                .header("x-request-id", &context.request_id);
            if let Some(body) = &body {
                builder = builder.json(body);
            }

            let (builder, sent_token) = match (&context.auth, retry_token.take()) {
                (_, Some(token)) => (builder.header(AUTHORIZATION, bearer(&token)?), Some(token)),
                (RequestAuth::Stored, None) => self.interceptor.authorize(builder)?,
                (RequestAuth::Public, None) => (builder, None),
                (RequestAuth::Bearer(token), None) => {
                    (builder.header(AUTHORIZATION, bearer(token)?), None)
                }
            };

            let response = match builder.send().await {
                Ok(response) => response,
                Err(e) => {
                    metrics::record_request(method.as_str(), "error");
                    warn!(
                        error = %e,
                        attempt = context.attempt,
                        "request failed without a response"
                    );
                    return Err(Error::Transport(e.to_string()));
                }
            };

            let status = response.status().as_u16();
            metrics::record_request(method.as_str(), &status.to_string());

            match on_response(status, &context) {
                InboundAction::Deliver => return decode(response).await,
                InboundAction::RefreshAndRetry => {
                    context = context.next_attempt();
                    match self.interceptor.recover(sent_token.as_deref()).await? {
                        Recovery::Retry(token) => {
                            debug!(attempt = context.attempt, "resubmitting after refresh");
                            metrics::record_auth_retry();
                            retry_token = Some(token);
                        }
                        Recovery::GiveUp => return Err(api_error(status, response).await),
                    }
                }
                InboundAction::Propagate => {
                    debug!(status, attempt = context.attempt, "propagating error response");
                    return Err(api_error(status, response).await);
                }
            }
        }
    }
}

fn to_body<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| Error::InvalidRequest(format!("serializing body: {e}")))
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<ApiEnvelope<T>> {
    let text = response
        .text()
        .await
        .map_err(|e| Error::Transport(format!("reading response body: {e}")))?;
    serde_json::from_str(&text).map_err(|e| Error::Decode(format!("malformed envelope: {e}")))
}

async fn api_error(status: u16, response: reqwest::Response) -> Error {
    let body = response.text().await.unwrap_or_default();
    Error::Api {
        status,
        message: extract_message(&body),
    }
}
