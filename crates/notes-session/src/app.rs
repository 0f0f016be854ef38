//! Composition root
//!
//! One `AppContext` per front end. It owns the API client, the session
//! manager and the subscription store; there is no global state.

use std::sync::Arc;

use notes_auth::TokenStore;
use notes_client::{ApiClient, Navigator, Transport};

use crate::auth_api::AuthApi;
use crate::billing::BillingApi;
use crate::billing_store::SubscriptionStore;
use crate::session::SessionManager;

pub struct AppContext {
    client: Arc<ApiClient>,
    session: SessionManager,
    billing: SubscriptionStore,
}

impl AppContext {
    pub fn new(transport: Transport, store: TokenStore, navigator: Arc<dyn Navigator>) -> Self {
        let client = Arc::new(ApiClient::new(transport, store, navigator.clone()));
        let session = SessionManager::new(AuthApi::new(client.clone()));
        let billing = SubscriptionStore::new(BillingApi::new(client.clone()), navigator);
        Self {
            client,
            session,
            billing,
        }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn billing(&self) -> &SubscriptionStore {
        &self.billing
    }
}
