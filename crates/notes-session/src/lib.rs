//! BiliNote session and billing state
//!
//! Wraps the remote auth, subscription and payment endpoints and keeps the
//! client-side state built from them. `AppContext` wires everything to one
//! `ApiClient`; front ends hold the context and read snapshots from its
//! `SessionManager` and `SubscriptionStore`.
//!
//! Session lifecycle:
//! 1. `restore()` adopts stored tokens and the cached user (`Restoring`)
//! 2. `confirm()` asks the server for the current user (`Authenticated`)
//! 3. `login()` / `register()` pass through `Authenticating`
//! 4. `logout()` or a rejected session returns to `Anonymous`

pub mod app;
pub mod auth_api;
pub mod billing;
pub mod billing_store;
pub mod session;
pub mod validation;

#[cfg(test)]
mod testing;

pub use app::AppContext;
pub use auth_api::AuthApi;
pub use billing::{
    BillingApi, BillingCycle, CheckoutSession, CustomerPortal, Invoice, PlanFeatures, PlanType,
    PricingPlan, Subscription, SubscriptionStatus, UsageStats,
};
pub use billing_store::{BillingSnapshot, SubscriptionStore};
pub use session::{SessionManager, SessionPhase, SessionSnapshot};
pub use validation::{RegistrationForm, ValidationError, validate_registration};
