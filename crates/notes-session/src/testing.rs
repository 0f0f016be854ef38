//! In-process fake of the BiliNote API for session and billing tests.
//!
//! Seeded with one account (`a@b.com` / `correct`) on an active pro plan.
//! Login issues tokens derived from the email: `at_<email>` / `rt_<email>`.
//! A refresh rotates both to `at_<email>#r` / `rt_<email>#r`. The refresh
//! token `rt_revoked` is always rejected.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use notes_auth::{TokenStore, User};
use notes_client::{RecordingNavigator, Transport, TransportConfig};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::app::AppContext;

pub(crate) const EMAIL: &str = "a@b.com";
pub(crate) const PASSWORD: &str = "correct";

struct Account {
    password: String,
    user: User,
}

pub(crate) struct FakeApi {
    accounts: Mutex<HashMap<String, Account>>,
    subscription: Mutex<Value>,
    pub fail_plans: AtomicBool,
    pub fail_me: AtomicBool,
    pub requests: AtomicUsize,
    pub paths: Mutex<Vec<String>>,
}

impl FakeApi {
    fn seeded() -> Self {
        let mut accounts = HashMap::new();
        accounts.insert(
            EMAIL.to_string(),
            Account {
                password: PASSWORD.to_string(),
                user: user(1, EMAIL, Some("Ada")),
            },
        );
        Self {
            accounts: Mutex::new(accounts),
            subscription: Mutex::new(json!({
                "id": 10,
                "user_id": 1,
                "plan_type": "pro",
                "billing_cycle": "monthly",
                "status": "active",
                "max_videos_per_month": 100,
                "max_video_duration_minutes": 120,
                "current_period_start": "2025-01-01T00:00:00",
                "current_period_end": "2025-02-01T00:00:00",
                "trial_end": null,
                "cancel_at": null,
                "auto_renew": true,
                "created_at": "2025-01-01T00:00:00"
            })),
            fail_plans: AtomicBool::new(false),
            fail_me: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
            paths: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn saw(&self, path: &str) -> usize {
        self.paths
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }

    fn caller(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers
            .get("authorization")?
            .to_str()
            .ok()?
            .strip_prefix("Bearer at_")?;
        let token = token.strip_suffix(ROTATED).unwrap_or(token);
        self.accounts
            .lock()
            .unwrap()
            .contains_key(token)
            .then(|| token.to_string())
    }
}

pub(crate) fn user(id: i64, email: &str, full_name: Option<&str>) -> User {
    User {
        id,
        email: email.to_string(),
        username: None,
        full_name: full_name.map(str::to_string),
        avatar_url: None,
        is_active: true,
        is_verified: false,
        created_at: "2025-01-01T00:00:00".to_string(),
        last_login: None,
    }
}

fn ok(data: Value) -> Response {
    Json(json!({"code": 0, "msg": "success", "data": data})).into_response()
}

fn fail(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({"detail": detail}))).into_response()
}

fn unauthorized() -> Response {
    fail(StatusCode::UNAUTHORIZED, "Could not validate credentials")
}

const ROTATED: &str = "#r";

fn tokens(email: &str, suffix: &str) -> Value {
    json!({
        "access_token": format!("at_{email}{suffix}"),
        "refresh_token": format!("rt_{email}{suffix}"),
        "token_type": "bearer"
    })
}

async fn count(State(api): State<Arc<FakeApi>>, request: Request, next: Next) -> Response {
    api.requests.fetch_add(1, Ordering::SeqCst);
    api.paths
        .lock()
        .unwrap()
        .push(request.uri().path().to_string());
    next.run(request).await
}

async fn register(State(api): State<Arc<FakeApi>>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let mut accounts = api.accounts.lock().unwrap();
    if accounts.contains_key(&email) {
        return fail(StatusCode::BAD_REQUEST, "Email already registered");
    }
    let created = user(
        accounts.len() as i64 + 1,
        &email,
        body["full_name"].as_str(),
    );
    accounts.insert(
        email,
        Account {
            password: body["password"].as_str().unwrap_or_default().to_string(),
            user: created.clone(),
        },
    );
    ok(serde_json::to_value(created).unwrap())
}

async fn login(State(api): State<Arc<FakeApi>>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    let accounts = api.accounts.lock().unwrap();
    match accounts.get(email) {
        Some(account) if Some(account.password.as_str()) == body["password"].as_str() => {
            ok(tokens(email, ""))
        }
        _ => fail(StatusCode::UNAUTHORIZED, "Invalid credentials"),
    }
}

async fn refresh(State(api): State<Arc<FakeApi>>, Json(body): Json<Value>) -> Response {
    let email = body["refresh_token"]
        .as_str()
        .and_then(|t| t.strip_prefix("rt_"))
        .unwrap_or_default();
    let email = email.strip_suffix(ROTATED).unwrap_or(email);
    if api.accounts.lock().unwrap().contains_key(email) {
        ok(tokens(email, ROTATED))
    } else {
        fail(StatusCode::UNAUTHORIZED, "Invalid refresh token")
    }
}

async fn me(State(api): State<Arc<FakeApi>>, headers: HeaderMap) -> Response {
    if api.fail_me.load(Ordering::SeqCst) {
        return fail(StatusCode::INTERNAL_SERVER_ERROR, "User lookup failed");
    }
    let Some(email) = api.caller(&headers) else {
        return unauthorized();
    };
    let accounts = api.accounts.lock().unwrap();
    ok(serde_json::to_value(&accounts[&email].user).unwrap())
}

async fn update_me(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let Some(email) = api.caller(&headers) else {
        return unauthorized();
    };
    if body["username"] == "taken" {
        return fail(StatusCode::BAD_REQUEST, "Username already taken");
    }
    let mut accounts = api.accounts.lock().unwrap();
    let user = &mut accounts.get_mut(&email).unwrap().user;
    if let Some(name) = body["full_name"].as_str() {
        user.full_name = Some(name.to_string());
    }
    if let Some(name) = body["username"].as_str() {
        user.username = Some(name.to_string());
    }
    if let Some(url) = body["avatar_url"].as_str() {
        user.avatar_url = Some(url.to_string());
    }
    ok(serde_json::to_value(&*user).unwrap())
}

async fn change_password(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let Some(email) = api.caller(&headers) else {
        return unauthorized();
    };
    let mut accounts = api.accounts.lock().unwrap();
    let account = accounts.get_mut(&email).unwrap();
    if body["current_password"].as_str() != Some(account.password.as_str()) {
        return fail(StatusCode::BAD_REQUEST, "Incorrect password");
    }
    account.password = body["new_password"].as_str().unwrap_or_default().to_string();
    ok(json!({"message": "Password changed successfully"}))
}

async fn plans(State(api): State<Arc<FakeApi>>) -> Response {
    if api.fail_plans.load(Ordering::SeqCst) {
        return fail(StatusCode::INTERNAL_SERVER_ERROR, "Plans unavailable");
    }
    let features = |videos: i64, minutes: i64| {
        json!({
            "max_videos_per_month": videos,
            "max_video_duration_minutes": minutes,
            "ai_models": ["gpt-4o-mini"],
            "screenshots": videos > 10,
            "multi_modal": false,
            "mind_maps": true,
            "api_access": false,
            "priority_support": false,
            "custom_ai_keys": false
        })
    };
    ok(json!([
        {
            "plan_type": "free", "name": "Free", "description": "Try it out",
            "price_monthly": 0.0, "price_yearly": 0.0, "features": features(10, 30)
        },
        {
            "plan_type": "pro", "name": "Pro", "description": "For heavy users",
            "price_monthly": 19.99, "price_yearly": 199.0, "features": features(100, 120)
        }
    ]))
}

async fn current(State(api): State<Arc<FakeApi>>, headers: HeaderMap) -> Response {
    if api.caller(&headers).is_none() {
        return unauthorized();
    }
    ok(api.subscription.lock().unwrap().clone())
}

async fn usage(State(api): State<Arc<FakeApi>>, headers: HeaderMap) -> Response {
    if api.caller(&headers).is_none() {
        return unauthorized();
    }
    ok(json!({
        "videos_used": 7,
        "videos_limit": 100,
        "duration_used_minutes": 95,
        "duration_limit_minutes": 12000,
        "period_start": "2025-01-01T00:00:00",
        "period_end": "2025-02-01T00:00:00",
        "is_unlimited": false
    }))
}

async fn subscribe(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if api.caller(&headers).is_none() {
        return unauthorized();
    }
    if body["plan_type"] == "enterprise" {
        return fail(StatusCode::BAD_REQUEST, "Contact sales for enterprise plans");
    }
    let mut sub = api.subscription.lock().unwrap();
    sub["plan_type"] = body["plan_type"].clone();
    sub["billing_cycle"] = body["billing_cycle"].clone();
    sub["status"] = json!("active");
    sub["cancel_at"] = Value::Null;
    sub["auto_renew"] = json!(true);
    ok(json!({"message": "Subscribed"}))
}

async fn cancel(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if api.caller(&headers).is_none() {
        return unauthorized();
    }
    let immediately = params.get("immediately").is_some_and(|v| v == "true");
    let mut sub = api.subscription.lock().unwrap();
    sub["status"] = json!("cancelled");
    sub["auto_renew"] = json!(false);
    sub["cancel_at"] = if immediately {
        json!("2025-01-15T00:00:00")
    } else {
        sub["current_period_end"].clone()
    };
    ok(Value::Null)
}

async fn invoices(State(api): State<Arc<FakeApi>>, headers: HeaderMap) -> Response {
    if api.caller(&headers).is_none() {
        return unauthorized();
    }
    ok(json!([{
        "id": 501,
        "amount": 19.99,
        "currency": "usd",
        "status": "paid",
        "plan_type": "pro",
        "billing_cycle": "monthly",
        "invoice_date": "2025-01-01T00:00:00",
        "paid_at": "2025-01-01T00:05:00",
        "invoice_pdf_url": null
    }]))
}

async fn checkout(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if api.caller(&headers).is_none() {
        return unauthorized();
    }
    if body["plan_type"] == "free" {
        return fail(StatusCode::BAD_REQUEST, "Free plan doesn't require payment");
    }
    ok(json!({
        "session_id": "cs_test_1",
        "url": "https://checkout.stripe.test/c/cs_test_1"
    }))
}

async fn portal(State(api): State<Arc<FakeApi>>, headers: HeaderMap) -> Response {
    if api.caller(&headers).is_none() {
        return unauthorized();
    }
    ok(json!({"url": "https://billing.stripe.test/p/session_1"}))
}

pub(crate) async fn start() -> (String, Arc<FakeApi>) {
    let api = Arc::new(FakeApi::seeded());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = axum::Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/me", get(me).put(update_me))
        .route("/api/auth/change-password", post(change_password))
        .route("/api/subscription/plans", get(plans))
        .route("/api/subscription/current", get(current))
        .route("/api/subscription/usage", get(usage))
        .route("/api/subscription/subscribe", post(subscribe))
        .route("/api/subscription/cancel", post(cancel))
        .route("/api/subscription/invoices", get(invoices))
        .route("/api/payment/create-checkout-session", post(checkout))
        .route("/api/payment/customer-portal", get(portal))
        .layer(middleware::from_fn_with_state(api.clone(), count))
        .with_state(api.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), api)
}

/// Composition root wired to `base_url` with an in-memory or caller-supplied store.
pub(crate) fn context(base_url: &str, store: TokenStore) -> (AppContext, Arc<RecordingNavigator>) {
    let nav = Arc::new(RecordingNavigator::new());
    let transport = Transport::new(TransportConfig::new(base_url)).unwrap();
    (AppContext::new(transport, store, nav.clone()), nav)
}
