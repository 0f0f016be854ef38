//! BiliNote authentication primitives
//!
//! Provides the client-side token store, the credential and user record types,
//! and the raw token refresh call. This crate has no dependency on the
//! interceptor pipeline; the refresh call in particular must never go through
//! it, otherwise an expired refresh would recurse into another refresh.
//!
//! Credential flow:
//! 1. Login/registration returns `AuthTokens`
//! 2. Tokens persisted via `TokenStore::save()` as a `CredentialPair`
//! 3. Current user cached via `TokenStore::save_user()`
//! 4. On a 401 the interceptor calls `token::refresh_tokens()` with the stored refresh token
//! 5. Logout or an irrecoverable refresh clears everything via `TokenStore::clear()`

pub mod constants;
pub mod error;
pub mod store;
pub mod token;
pub mod user;

pub use constants::*;
pub use error::{Error, Result};
pub use store::{FileStorage, KeyValueStorage, MemoryStorage, TokenStore};
pub use token::{AuthTokens, CredentialPair, refresh_tokens};
pub use user::{LoginRequest, ProfileUpdate, RegisterRequest, User};
