//! Client error taxonomy
//!
//! - `Transport`: no response was received (connect failure, timeout)
//! - `Api`: the server answered non-2xx; `message` is the server's own text
//! - `SessionExpired`: the token refresh itself failed and the session was torn down
//! - `Decode`: a 2xx response whose envelope couldn't be read

/// Errors surfaced by API calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("API returned {status}: {}", .message.as_deref().unwrap_or("<no message>"))]
    Api {
        status: u16,
        message: Option<String>,
    },

    #[error("session expired: {0}")]
    SessionExpired(String),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("token storage error: {0}")]
    Storage(#[from] notes_auth::Error),
}

impl Error {
    /// HTTP status, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Message taken verbatim from the server's error payload, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Error::Api { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Text to show a user: the server's message when present, else `default`.
    pub fn user_message(&self, default: &str) -> String {
        self.server_message().unwrap_or(default).to_string()
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
