//! Storage keys and API paths shared by the auth-aware crates

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Storage key for the serialized user record
pub const USER_KEY: &str = "user";

/// API origin used when no base URL is configured
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8483";

/// Where the user is sent once the session cannot be recovered
pub const LOGIN_ENTRY_POINT: &str = "/auth/login";

pub const REGISTER_PATH: &str = "/api/auth/register";
pub const LOGIN_PATH: &str = "/api/auth/login";
pub const ME_PATH: &str = "/api/auth/me";
pub const CHANGE_PASSWORD_PATH: &str = "/api/auth/change-password";
pub const REFRESH_PATH: &str = "/api/auth/refresh";
