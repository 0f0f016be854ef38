//! Client metrics
//!
//! - `client_requests_total` (counter): labels `method`, `status`
//! - `client_token_refresh_total` (counter): label `outcome`
//! - `client_auth_retries_total` (counter)
//!
//! Without an installed recorder these are no-ops.

/// Record a completed HTTP exchange. `status` is `"error"` when no response
/// was received.
pub fn record_request(method: &str, status: &str) {
    metrics::counter!(
        "client_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a refresh attempt outcome: `success`, `failure`, `persist_failure`,
/// `joined` or `no_refresh_token`.
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("client_token_refresh_total", "outcome" => outcome).increment(1);
}

/// Record a request resubmitted after a refresh.
pub fn record_auth_retry() {
    metrics::counter!("client_auth_retries_total").increment(1);
}
