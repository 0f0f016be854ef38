//! Subscription store
//!
//! Caches plans, the current subscription, usage and invoices. Reads are
//! best-effort: a failure is recorded in `error` and not returned. Mutations
//! (`subscribe`, `cancel_subscription`) are fire-and-refresh: the subscription
//! is always re-fetched from the server afterwards, and failures are recorded
//! and returned.

use std::sync::Arc;

use notes_client::{Navigator, Result};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::billing::{
    BillingApi, BillingCycle, Invoice, PlanType, PricingPlan, Subscription, UsageStats,
};

pub const FETCH_PLANS_FAILED: &str = "Failed to fetch plans";
pub const FETCH_SUBSCRIPTION_FAILED: &str = "Failed to fetch subscription";
pub const FETCH_USAGE_FAILED: &str = "Failed to fetch usage";
pub const FETCH_INVOICES_FAILED: &str = "Failed to fetch invoices";
pub const SUBSCRIBE_FAILED: &str = "Subscription failed";
pub const CANCEL_FAILED: &str = "Cancellation failed";
pub const CHECKOUT_FAILED: &str = "Checkout failed";
pub const PORTAL_FAILED: &str = "Failed to open customer portal";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillingSnapshot {
    pub subscription: Option<Subscription>,
    pub usage: Option<UsageStats>,
    pub plans: Vec<PricingPlan>,
    pub invoices: Vec<Invoice>,
    pub is_loading: bool,
    pub error: Option<String>,
}

pub struct SubscriptionStore {
    api: BillingApi,
    navigator: Arc<dyn Navigator>,
    state: watch::Sender<BillingSnapshot>,
}

impl SubscriptionStore {
    pub fn new(api: BillingApi, navigator: Arc<dyn Navigator>) -> Self {
        let (state, _) = watch::channel(BillingSnapshot::default());
        Self {
            api,
            navigator,
            state,
        }
    }

    pub fn snapshot(&self) -> BillingSnapshot {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<BillingSnapshot> {
        self.state.subscribe()
    }

    pub async fn fetch_plans(&self) {
        self.begin();
        match self.api.plans().await {
            Ok(plans) => self.finish(|s| s.plans = plans),
            Err(e) => self.record(&e, FETCH_PLANS_FAILED),
        }
    }

    pub async fn fetch_subscription(&self) {
        self.begin();
        match self.api.current_subscription().await {
            Ok(sub) => self.finish(|s| s.subscription = Some(sub)),
            Err(e) => self.record(&e, FETCH_SUBSCRIPTION_FAILED),
        }
    }

    pub async fn fetch_usage(&self) {
        self.begin();
        match self.api.usage().await {
            Ok(usage) => self.finish(|s| s.usage = Some(usage)),
            Err(e) => self.record(&e, FETCH_USAGE_FAILED),
        }
    }

    pub async fn fetch_invoices(&self) {
        self.begin();
        match self.api.invoices().await {
            Ok(invoices) => self.finish(|s| s.invoices = invoices),
            Err(e) => self.record(&e, FETCH_INVOICES_FAILED),
        }
    }

    /// Switch plans, then reload the subscription.
    pub async fn subscribe(&self, plan: PlanType, cycle: BillingCycle) -> Result<Subscription> {
        self.begin();
        let result = match self.api.subscribe(plan, cycle).await {
            Ok(()) => self.api.current_subscription().await,
            Err(e) => Err(e),
        };
        self.settle_mutation(result, SUBSCRIBE_FAILED)
    }

    /// Cancel, then reload the subscription. Effective timing is the server's call.
    pub async fn cancel_subscription(&self, immediately: bool) -> Result<Subscription> {
        self.begin();
        let result = match self.api.cancel(immediately).await {
            Ok(()) => self.api.current_subscription().await,
            Err(e) => Err(e),
        };
        self.settle_mutation(result, CANCEL_FAILED)
    }

    /// Create a checkout session and hand its URL to the navigator.
    pub async fn start_checkout(&self, plan: PlanType, cycle: BillingCycle) -> Result<String> {
        self.begin();
        match self.api.create_checkout_session(plan, cycle).await {
            Ok(session) => {
                debug!(session_id = %session.session_id, "checkout session created");
                self.finish(|_| ());
                self.navigator.open_url(&session.url);
                Ok(session.url)
            }
            Err(e) => {
                self.record(&e, CHECKOUT_FAILED);
                Err(e)
            }
        }
    }

    /// Fetch the billing portal URL and hand it to the navigator.
    pub async fn open_customer_portal(&self) -> Result<String> {
        self.begin();
        match self.api.customer_portal().await {
            Ok(portal) => {
                self.finish(|_| ());
                self.navigator.open_url(&portal.url);
                Ok(portal.url)
            }
            Err(e) => {
                self.record(&e, PORTAL_FAILED);
                Err(e)
            }
        }
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.error.take().is_some());
    }

    fn begin(&self) {
        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });
    }

    fn finish(&self, apply: impl FnOnce(&mut BillingSnapshot)) {
        self.state.send_modify(|s| {
            apply(s);
            s.is_loading = false;
        });
    }

    fn record(&self, e: &notes_client::Error, default: &str) {
        let message = e.user_message(default);
        warn!(error = %e, operation = default, "billing request failed");
        self.state.send_modify(|s| {
            s.is_loading = false;
            s.error = Some(message);
        });
    }

    fn settle_mutation(
        &self,
        result: Result<Subscription>,
        default: &str,
    ) -> Result<Subscription> {
        match result {
            Ok(sub) => {
                info!(plan = %sub.plan_type, status = %sub.status, "subscription updated");
                self.finish(|s| s.subscription = Some(sub.clone()));
                Ok(sub)
            }
            Err(e) => {
                self.record(&e, default);
                Err(e)
            }
        }
    }
}
