//! HTTP client core for the BiliNote API
//!
//! Layers, leaf-first:
//! - `transport`: one configured `reqwest::Client` (base URL, default headers, timeout)
//! - `interceptor`: bearer attachment and the one-shot refresh-and-retry policy
//! - `client`: `ApiClient`, which runs calls through the interceptor and unwraps
//!   the `{code, data, msg}` envelope
//!
//! The `Navigator` trait is the seam to the embedding front end: the client
//! asks it to show the login entry point when a session can't be recovered,
//! and billing flows ask it to open payment URLs.

pub mod client;
pub mod envelope;
pub mod error;
pub mod interceptor;
pub mod metrics;
pub mod navigator;
pub mod transport;

pub use client::ApiClient;
pub use envelope::{ApiEnvelope, extract_message};
pub use error::{Error, Result};
pub use interceptor::{
    AuthInterceptor, InboundAction, RequestAuth, RequestContext, on_response,
};
pub use navigator::{Navigation, Navigator, RecordingNavigator};
pub use reqwest::Method;
pub use transport::{HeaderInjection, Transport, TransportConfig};
