//! Navigation seam
//!
//! The client core never renders anything. When the session is torn down it
//! asks the embedding front end to go to the login entry point, and payment
//! flows hand it an opaque URL to open. What "navigate" means is up to the
//! front end.

use std::sync::Mutex;

/// Front-end navigation hooks.
pub trait Navigator: Send + Sync {
    /// Send the user to the login entry point.
    fn redirect_to_login(&self);

    /// Full-page navigation to an external URL (checkout, billing portal).
    fn open_url(&self, url: &str);
}

/// A navigation request captured by `RecordingNavigator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Login,
    External(String),
}

/// Navigator that records every request, for headless embedding and tests.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<Navigation>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visits(&self) -> Vec<Navigation> {
        self.visits.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Most recent navigation, if any.
    pub fn last(&self) -> Option<Navigation> {
        self.visits.lock().ok().and_then(|v| v.last().cloned())
    }

    fn push(&self, navigation: Navigation) {
        if let Ok(mut visits) = self.visits.lock() {
            visits.push(navigation);
        }
    }
}

impl Navigator for RecordingNavigator {
    fn redirect_to_login(&self) {
        self.push(Navigation::Login);
    }

    fn open_url(&self, url: &str) {
        self.push(Navigation::External(url.to_string()));
    }
}
