//! Subscription and payment resources
//!
//! Read operations are plain fetches. Mutations return nothing useful on
//! purpose: callers re-fetch the subscription afterwards instead of guessing
//! server-computed fields such as renewal dates or `cancel_at`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use notes_client::{ApiClient, Method, Result};
use serde::{Deserialize, Serialize};

pub const PLANS_PATH: &str = "/api/subscription/plans";
pub const CURRENT_SUBSCRIPTION_PATH: &str = "/api/subscription/current";
pub const USAGE_PATH: &str = "/api/subscription/usage";
pub const SUBSCRIBE_PATH: &str = "/api/subscription/subscribe";
pub const CANCEL_PATH: &str = "/api/subscription/cancel";
pub const INVOICES_PATH: &str = "/api/subscription/invoices";
pub const CHECKOUT_PATH: &str = "/api/payment/create-checkout-session";
pub const CUSTOMER_PORTAL_PATH: &str = "/api/payment/customer-portal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Free,
    Basic,
    Pro,
    Enterprise,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Free => "free",
            PlanType::Basic => "basic",
            PlanType::Pro => "pro",
            PlanType::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(PlanType::Free),
            "basic" => Ok(PlanType::Basic),
            "pro" => Ok(PlanType::Pro),
            "enterprise" => Ok(PlanType::Enterprise),
            other => Err(format!(
                "unknown plan '{other}' (expected free, basic, pro or enterprise)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
        }
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingCycle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "monthly" => Ok(BillingCycle::Monthly),
            "yearly" => Ok(BillingCycle::Yearly),
            other => Err(format!(
                "unknown billing cycle '{other}' (expected monthly or yearly)"
            )),
        }
    }
}

/// Subscription status. The server may add states; unknown ones are kept
/// verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
    PastDue,
    Trialing,
    Other(String),
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Other(other) => other,
        }
    }
}

impl From<String> for SubscriptionStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "active" => SubscriptionStatus::Active,
            "cancelled" => SubscriptionStatus::Cancelled,
            "expired" => SubscriptionStatus::Expired,
            "past_due" => SubscriptionStatus::PastDue,
            "trialing" => SubscriptionStatus::Trialing,
            _ => SubscriptionStatus::Other(value),
        }
    }
}

impl From<SubscriptionStatus> for String {
    fn from(status: SubscriptionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user's current plan assignment. Timestamps are the server's ISO-8601
/// strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub plan_type: PlanType,
    #[serde(default)]
    pub billing_cycle: Option<BillingCycle>,
    pub status: SubscriptionStatus,
    pub max_videos_per_month: i64,
    pub max_video_duration_minutes: i64,
    pub current_period_start: String,
    #[serde(default)]
    pub current_period_end: Option<String>,
    #[serde(default)]
    pub trial_end: Option<String>,
    #[serde(default)]
    pub cancel_at: Option<String>,
    pub auto_renew: bool,
    pub created_at: String,
}

/// Consumption counters for the current billing period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub videos_used: i64,
    pub videos_limit: i64,
    pub duration_used_minutes: i64,
    pub duration_limit_minutes: i64,
    pub period_start: String,
    #[serde(default)]
    pub period_end: Option<String>,
    pub is_unlimited: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanFeatures {
    pub max_videos_per_month: i64,
    pub max_video_duration_minutes: i64,
    pub ai_models: Vec<String>,
    pub screenshots: bool,
    pub multi_modal: bool,
    pub mind_maps: bool,
    pub api_access: bool,
    pub priority_support: bool,
    pub custom_ai_keys: bool,
}

/// Catalog entry. Plans are fetched as a set and never individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingPlan {
    pub plan_type: PlanType,
    pub name: String,
    pub description: String,
    pub price_monthly: f64,
    pub price_yearly: f64,
    pub features: PlanFeatures,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub plan_type: PlanType,
    pub billing_cycle: BillingCycle,
    pub invoice_date: String,
    #[serde(default)]
    pub paid_at: Option<String>,
    #[serde(default)]
    pub invoice_pdf_url: Option<String>,
}

/// Hosted checkout page for a paid plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

/// Hosted billing portal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerPortal {
    pub url: String,
}

#[derive(Serialize)]
struct PlanSelection {
    plan_type: PlanType,
    billing_cycle: BillingCycle,
}

/// Subscription and payment endpoints of the API.
#[derive(Clone)]
pub struct BillingApi {
    client: Arc<ApiClient>,
}

impl BillingApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn plans(&self) -> Result<Vec<PricingPlan>> {
        self.client.get(PLANS_PATH).await
    }

    pub async fn current_subscription(&self) -> Result<Subscription> {
        self.client.get(CURRENT_SUBSCRIPTION_PATH).await
    }

    pub async fn usage(&self) -> Result<UsageStats> {
        self.client.get(USAGE_PATH).await
    }

    pub async fn invoices(&self) -> Result<Vec<Invoice>> {
        self.client.get(INVOICES_PATH).await
    }

    pub async fn subscribe(&self, plan_type: PlanType, billing_cycle: BillingCycle) -> Result<()> {
        let body = selection_body(plan_type, billing_cycle)?;
        self.client
            .send(Method::POST, SUBSCRIBE_PATH, Some(body))
            .await
    }

    /// Cancel the current subscription. `immediately` only changes when the
    /// server applies it; the client passes it through.
    pub async fn cancel(&self, immediately: bool) -> Result<()> {
        self.client
            .send(Method::POST, &cancel_path(immediately), None)
            .await
    }

    pub async fn create_checkout_session(
        &self,
        plan_type: PlanType,
        billing_cycle: BillingCycle,
    ) -> Result<CheckoutSession> {
        let body = selection_body(plan_type, billing_cycle)?;
        self.client
            .execute(Method::POST, CHECKOUT_PATH, Some(body))
            .await
    }

    pub async fn customer_portal(&self) -> Result<CustomerPortal> {
        self.client.get(CUSTOMER_PORTAL_PATH).await
    }
}

fn selection_body(plan_type: PlanType, billing_cycle: BillingCycle) -> Result<serde_json::Value> {
    serde_json::to_value(PlanSelection {
        plan_type,
        billing_cycle,
    })
    .map_err(|e| notes_client::Error::InvalidRequest(format!("serializing body: {e}")))
}

fn cancel_path(immediately: bool) -> String {
    format!("{CANCEL_PATH}?immediately={immediately}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_and_cycle_parse_case_insensitively() {
        assert_eq!("Pro".parse::<PlanType>().unwrap(), PlanType::Pro);
        assert_eq!(
            "YEARLY".parse::<BillingCycle>().unwrap(),
            BillingCycle::Yearly
        );
        assert!("gold".parse::<PlanType>().is_err());
        assert!("weekly".parse::<BillingCycle>().is_err());
    }

    #[test]
    fn unknown_status_is_preserved() {
        let status: SubscriptionStatus = serde_json::from_str(r#""incomplete""#).unwrap();
        assert_eq!(status, SubscriptionStatus::Other("incomplete".into()));
        assert_eq!(serde_json::to_string(&status).unwrap(), r#""incomplete""#);

        let past_due: SubscriptionStatus = serde_json::from_str(r#""past_due""#).unwrap();
        assert_eq!(past_due, SubscriptionStatus::PastDue);
    }

    #[test]
    fn subscription_deserializes_server_shape() {
        let json = r#"{
            "id": 3, "user_id": 1, "plan_type": "pro", "billing_cycle": "monthly",
            "status": "cancelled", "max_videos_per_month": 100,
            "max_video_duration_minutes": 120,
            "current_period_start": "2025-01-01T00:00:00",
            "current_period_end": "2025-02-01T00:00:00",
            "trial_end": null, "cancel_at": "2025-02-01T00:00:00",
            "auto_renew": false, "created_at": "2025-01-01T00:00:00"
        }"#;
        let sub: Subscription = serde_json::from_str(json).unwrap();
        assert_eq!(sub.plan_type, PlanType::Pro);
        assert_eq!(sub.status, SubscriptionStatus::Cancelled);
        assert_eq!(sub.cancel_at.as_deref(), Some("2025-02-01T00:00:00"));
    }

    #[test]
    fn cancel_path_carries_flag() {
        assert_eq!(cancel_path(false), "/api/subscription/cancel?immediately=false");
        assert_eq!(cancel_path(true), "/api/subscription/cancel?immediately=true");
    }

    #[test]
    fn plan_selection_body_shape() {
        let body = selection_body(PlanType::Basic, BillingCycle::Yearly).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"plan_type": "basic", "billing_cycle": "yearly"})
        );
    }
}
