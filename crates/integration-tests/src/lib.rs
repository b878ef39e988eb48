//! Integration test harness for the Agent Market client.
//!
//! [`FakeBackend`] serves the marketplace REST API from an in-process axum
//! router bound to an ephemeral port. It keeps accounts, tokens and
//! purchases in memory and counts every request, so tests can assert both
//! what the client did and what it did *not* send.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p agent-market-integration-tests
//! ```
//!
//! # Seed data
//!
//! - One account: [`SEED_EMAIL`] / [`SEED_PASSWORD`]
//! - Eight agents across six categories, priced between $9 and $450
//!   (see [`seed_agents`])

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::{Multipart, Path as UrlPath, Query, Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use agent_market_client::{ClientConfig, Marketplace};

/// Email of the account every backend starts with.
pub const SEED_EMAIL: &str = "ada@example.com";
/// Password of the seeded account.
pub const SEED_PASSWORD: &str = "hunter22";

// =============================================================================
// Backend state
// =============================================================================

/// An account known to the fake backend.
#[derive(Debug, Clone)]
struct Account {
    id: i64,
    name: String,
    email: String,
    password: String,
    avatar: Option<String>,
    role: String,
}

impl Account {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
            "avatar": self.avatar,
            "is_verified": true,
            "role": self.role,
        })
    }
}

/// A listed agent.
#[derive(Debug, Clone)]
pub struct SeedAgent {
    pub id: i64,
    pub name: &'static str,
    pub category: &'static str,
    pub price: Decimal,
    pub rating: f64,
    pub sales: u32,
}

impl SeedAgent {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "description": format!("{} does useful work", self.name),
            "price": self.price.to_string(),
            "category": self.category,
            "rating": self.rating,
            "reviews_count": self.sales / 10,
            "sales_count": self.sales,
            "seller": {"id": 1, "name": "Acme AI", "verified": true},
            "thumbnail": format!("agents/{}/thumb.png", self.id),
            "capabilities": ["automation"],
        })
    }
}

/// Metadata of the last avatar upload received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedUpload {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
}

#[derive(Default)]
struct BackendState {
    hits: Mutex<HashMap<String, usize>>,
    queries: Mutex<Vec<HashMap<String, String>>>,
    accounts: Mutex<Vec<Account>>,
    tokens: Mutex<HashMap<String, i64>>,
    purchases: Mutex<HashSet<(i64, i64)>>,
    agents: Vec<SeedAgent>,
    delays: Mutex<HashMap<String, Duration>>,
    behavior: Mutex<Behavior>,
    last_upload: Mutex<Option<ReceivedUpload>>,
    next_id: Mutex<i64>,
}

/// Switches that make the backend misbehave on purpose.
#[derive(Debug, Default, Clone, Copy)]
struct Behavior {
    ignore_filters: bool,
    fail_logout: bool,
    fail_listing: bool,
}

/// Lock a mutex, ignoring poisoning from a panicked test task.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl BackendState {
    fn seeded() -> Self {
        let state = Self {
            agents: seed_agents(),
            next_id: Mutex::new(2),
            ..Self::default()
        };
        lock(&state.accounts).push(Account {
            id: 1,
            name: "Ada Lovelace".to_string(),
            email: SEED_EMAIL.to_string(),
            password: SEED_PASSWORD.to_string(),
            avatar: None,
            role: "customer".to_string(),
        });
        state
    }

    fn issue_token(&self, account_id: i64) -> String {
        let mut tokens = lock(&self.tokens);
        let token = format!("token-{account_id}-{}", tokens.len() + 1);
        tokens.insert(token.clone(), account_id);
        token
    }

    fn account(&self, id: i64) -> Option<Account> {
        lock(&self.accounts).iter().find(|a| a.id == id).cloned()
    }

    /// Answer 401 when a bearer token is sent but no longer valid.
    ///
    /// Public routes accept anonymous requests, but a revoked token is still
    /// refused rather than ignored.
    fn reject_stale_token(&self, headers: &HeaderMap) -> Option<Response> {
        if !headers.contains_key(AUTHORIZATION) {
            return None;
        }
        self.authenticate(headers).err()
    }

    /// Resolve the bearer token to an account id.
    fn authenticate(&self, headers: &HeaderMap) -> Result<i64, Response> {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .and_then(|token| lock(&self.tokens).get(token).copied())
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"message": "Unauthenticated."})),
                )
                    .into_response()
            })
    }
}

/// The catalog every backend starts with.
#[must_use]
pub fn seed_agents() -> Vec<SeedAgent> {
    let agent = |id, name, category, price: i64, rating, sales| SeedAgent {
        id,
        name,
        category,
        price: Decimal::new(price, 2),
        rating,
        sales,
    };
    vec![
        agent(1, "Ticket Triage", "Customer Service", 4900, 4.6, 240),
        agent(2, "Blog Writer", "Content Creation", 2900, 4.2, 310),
        agent(3, "Churn Predictor", "Data Analysis", 12000, 4.8, 95),
        agent(4, "Code Reviewer", "Development", 9950, 4.9, 410),
        agent(5, "Test Writer", "Development", 45000, 4.1, 30),
        agent(6, "Lead Scorer", "Sales", 900, 3.9, 150),
        agent(7, "Deal Closer", "Sales", 7500, 4.4, 60),
        agent(8, "Paper Summarizer", "Research", 1500, 4.7, 500),
    ]
}

// =============================================================================
// Handlers
// =============================================================================

type Shared = Arc<BackendState>;

fn failure(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

/// Count every request by `METHOD path`.
async fn count_requests(State(state): State<Shared>, req: Request, next: Next) -> Response {
    let key = format!("{} {}", req.method(), req.uri().path());
    *lock(&state.hits).entry(key).or_default() += 1;
    next.run(req).await
}

async fn list_agents(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    lock(&state.queries).push(params.clone());
    if let Some(response) = state.reject_stale_token(&headers) {
        return response;
    }

    let category = params.get("category").cloned();
    let delay = category
        .as_ref()
        .and_then(|c| lock(&state.delays).get(c).copied());
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let behavior = *lock(&state.behavior);
    if behavior.fail_listing {
        return failure(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"success": false, "message": "Maintenance"}),
        );
    }

    let bound = |key: &str| params.get(key).and_then(|v| Decimal::from_str(v).ok());
    let (min, max) = (bound("min_price"), bound("max_price"));

    let mut agents: Vec<&SeedAgent> = state
        .agents
        .iter()
        .filter(|a| {
            behavior.ignore_filters
                || (category.as_deref().is_none_or(|c| c == a.category)
                    && min.is_none_or(|m| a.price >= m)
                    && max.is_none_or(|m| a.price <= m))
        })
        .collect();

    match params.get("sort_by").map(String::as_str) {
        Some("price-low") => agents.sort_by_key(|a| a.price),
        Some("price-high") => agents.sort_by_key(|a| std::cmp::Reverse(a.price)),
        Some("newest") => agents.sort_by_key(|a| std::cmp::Reverse(a.id)),
        Some("rating") => agents.sort_by(|a, b| b.rating.total_cmp(&a.rating)),
        _ => agents.sort_by_key(|a| std::cmp::Reverse(a.sales)),
    }

    let data: Vec<Value> = agents.iter().map(|a| a.to_json()).collect();
    Json(json!({"success": true, "data": data})).into_response()
}

async fn show_agent(
    State(state): State<Shared>,
    UrlPath(id): UrlPath<i64>,
    headers: HeaderMap,
) -> Response {
    if let Some(response) = state.reject_stale_token(&headers) {
        return response;
    }
    state.agents.iter().find(|a| a.id == id).map_or_else(
        || {
            failure(
                StatusCode::NOT_FOUND,
                json!({"success": false, "message": "Agent not found"}),
            )
        },
        |agent| Json(json!({"success": true, "data": agent.to_json()})).into_response(),
    )
}

async fn download_agent(
    State(state): State<Shared>,
    UrlPath(id): UrlPath<i64>,
    headers: HeaderMap,
) -> Response {
    let user_id = match state.authenticate(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if !lock(&state.purchases).contains(&(user_id, id)) {
        return failure(
            StatusCode::FORBIDDEN,
            json!({"success": false, "message": "You have not purchased this agent"}),
        );
    }

    (
        [
            (CONTENT_TYPE, "application/zip".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"agent-{id}.zip\""),
            ),
        ],
        format!("PK package for agent {id}").into_bytes(),
    )
        .into_response()
}

#[derive(Deserialize)]
struct RegisterBody {
    name: String,
    email: String,
    password: String,
    #[serde(default)]
    role: Option<String>,
}

async fn register(State(state): State<Shared>, Json(body): Json<RegisterBody>) -> Response {
    if lock(&state.accounts)
        .iter()
        .any(|a| a.email.eq_ignore_ascii_case(&body.email))
    {
        return failure(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "success": false,
                "errors": {"email": ["The email has already been taken."]},
            }),
        );
    }

    let id = {
        let mut next = lock(&state.next_id);
        let id = *next;
        *next += 1;
        id
    };
    let account = Account {
        id,
        name: body.name,
        email: body.email,
        password: body.password,
        avatar: None,
        role: body.role.unwrap_or_else(|| "customer".to_string()),
    };
    let user = account.to_json();
    lock(&state.accounts).push(account);
    let token = state.issue_token(id);

    (
        StatusCode::CREATED,
        Json(json!({"success": true, "user": user, "token": token})),
    )
        .into_response()
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(State(state): State<Shared>, Json(body): Json<LoginBody>) -> Response {
    let account = lock(&state.accounts)
        .iter()
        .find(|a| a.email.eq_ignore_ascii_case(&body.email) && a.password == body.password)
        .cloned();

    match account {
        Some(account) => {
            let token = state.issue_token(account.id);
            Json(json!({"success": true, "user": account.to_json(), "token": token}))
                .into_response()
        }
        None => failure(
            StatusCode::UNAUTHORIZED,
            json!({"success": false, "message": "Invalid credentials"}),
        ),
    }
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if lock(&state.behavior).fail_logout {
        return failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"success": false, "message": "Server Error"}),
        );
    }
    if let Err(response) = state.authenticate(&headers) {
        return response;
    }
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        lock(&state.tokens).remove(token);
    }
    Json(json!({"success": true, "message": "Logged out successfully"})).into_response()
}

async fn me(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let user_id = match state.authenticate(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    state.account(user_id).map_or_else(
        || failure(StatusCode::NOT_FOUND, json!({"message": "User not found"})),
        |account| Json(json!({"success": true, "user": account.to_json()})).into_response(),
    )
}

#[derive(Deserialize)]
struct ProfileBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

async fn update_profile(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<ProfileBody>,
) -> Response {
    let user_id = match state.authenticate(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let mut accounts = lock(&state.accounts);
    if let Some(email) = &body.email
        && accounts
            .iter()
            .any(|a| a.id != user_id && a.email.eq_ignore_ascii_case(email))
    {
        return failure(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "success": false,
                "message": "Validation failed",
                "errors": {"email": ["The email has already been taken."]},
            }),
        );
    }

    let Some(account) = accounts.iter_mut().find(|a| a.id == user_id) else {
        return failure(StatusCode::NOT_FOUND, json!({"message": "User not found"}));
    };
    if let Some(name) = body.name {
        account.name = name;
    }
    if let Some(email) = body.email {
        account.email = email;
    }
    Json(json!({"success": true, "user": account.to_json()})).into_response()
}

async fn upload_avatar(
    State(state): State<Shared>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let user_id = match state.authenticate(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let Ok(Some(field)) = multipart.next_field().await else {
        return failure(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"success": false, "errors": {"avatar": ["The avatar field is required."]}}),
        );
    };
    let upload = ReceivedUpload {
        field: field.name().unwrap_or_default().to_string(),
        file_name: field.file_name().unwrap_or_default().to_string(),
        content_type: field.content_type().unwrap_or_default().to_string(),
        size: 0,
    };
    let Ok(bytes) = field.bytes().await else {
        return failure(StatusCode::BAD_REQUEST, json!({"message": "Bad upload"}));
    };
    let upload = ReceivedUpload {
        size: bytes.len(),
        ..upload
    };

    let path = format!("avatars/{user_id}-{}", upload.file_name);
    if let Some(account) = lock(&state.accounts).iter_mut().find(|a| a.id == user_id) {
        account.avatar = Some(path.clone());
    }
    *lock(&state.last_upload) = Some(upload);

    Json(json!({"success": true, "avatar": path})).into_response()
}

#[derive(Deserialize)]
struct PasswordBody {
    current_password: String,
    new_password: String,
    new_password_confirmation: String,
}

async fn change_password(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<PasswordBody>,
) -> Response {
    let user_id = match state.authenticate(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if body.new_password != body.new_password_confirmation {
        return failure(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"success": false, "errors": {"new_password": ["The new password confirmation does not match."]}}),
        );
    }

    let mut accounts = lock(&state.accounts);
    let Some(account) = accounts.iter_mut().find(|a| a.id == user_id) else {
        return failure(StatusCode::NOT_FOUND, json!({"message": "User not found"}));
    };
    if account.password != body.current_password {
        return failure(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"success": false, "message": "Current password is incorrect"}),
        );
    }
    account.password = body.new_password;
    Json(json!({"success": true, "message": "Password changed successfully"})).into_response()
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/agents", get(list_agents))
        .route("/api/agents/{id}", get(show_agent))
        .route("/api/agents/{id}/download", get(download_agent))
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/me", get(me))
        .route("/api/profile", put(update_profile))
        .route("/api/profile/avatar", post(upload_avatar))
        .route("/api/profile/change-password", post(change_password))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            count_requests,
        ))
        .with_state(state)
}

// =============================================================================
// FakeBackend
// =============================================================================

/// In-process marketplace backend.
///
/// The server task is aborted when this value is dropped.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Shared,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Bind to an ephemeral local port and start serving seed data.
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::seeded());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Failed to read local address");

        let app = router(Arc::clone(&state));
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// API base URL, e.g. `http://127.0.0.1:PORT/api`.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Origin the backend serves media from.
    #[must_use]
    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client configuration pointing at this backend, persisting the session
    /// to `session_file`.
    #[must_use]
    pub fn config(&self, session_file: &Path) -> ClientConfig {
        ClientConfig::new(&self.api_url())
            .expect("Fake backend URL should parse")
            .with_session_file(session_file)
    }

    /// A marketplace handle with its session file in a fresh temp dir.
    ///
    /// Keep the returned directory alive for as long as the handle is used.
    #[must_use]
    pub fn market(&self) -> (Marketplace, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let market = Marketplace::new(self.config(&dir.path().join("session.json")))
            .expect("Failed to build marketplace");
        (market, dir)
    }

    // -------------------------------------------------------------------------
    // Observation
    // -------------------------------------------------------------------------

    /// Number of requests received for `method path`, e.g. `("GET", "/api/me")`.
    #[must_use]
    pub fn hits(&self, method: &str, path: &str) -> usize {
        lock(&self.state.hits)
            .get(&format!("{method} {path}"))
            .copied()
            .unwrap_or(0)
    }

    /// Number of requests received on any route.
    #[must_use]
    pub fn total_hits(&self) -> usize {
        lock(&self.state.hits).values().sum()
    }

    /// Query parameters of every listing request, in arrival order.
    #[must_use]
    pub fn listing_queries(&self) -> Vec<HashMap<String, String>> {
        lock(&self.state.queries).clone()
    }

    /// The most recent avatar upload.
    #[must_use]
    pub fn last_upload(&self) -> Option<ReceivedUpload> {
        lock(&self.state.last_upload).clone()
    }

    // -------------------------------------------------------------------------
    // Manipulation
    // -------------------------------------------------------------------------

    /// Delay listing responses for `category` by `delay`.
    pub fn delay_category(&self, category: &str, delay: Duration) {
        lock(&self.state.delays).insert(category.to_string(), delay);
    }

    /// Return the full catalog regardless of the requested filters.
    pub fn ignore_filters(&self, on: bool) {
        lock(&self.state.behavior).ignore_filters = on;
    }

    /// Make `/logout` answer 500.
    pub fn fail_logout(&self, on: bool) {
        lock(&self.state.behavior).fail_logout = on;
    }

    /// Make the listing endpoint answer 503.
    pub fn fail_listing(&self, on: bool) {
        lock(&self.state.behavior).fail_listing = on;
    }

    /// Invalidate every issued token.
    pub fn revoke_all_tokens(&self) {
        lock(&self.state.tokens).clear();
    }

    /// Rename an account server-side.
    pub fn rename_account(&self, email: &str, name: &str) {
        if let Some(account) = lock(&self.state.accounts)
            .iter_mut()
            .find(|a| a.email == email)
        {
            account.name = name.to_string();
        }
    }

    /// Record that the account `email` bought `agent_id`.
    pub fn grant_purchase(&self, email: &str, agent_id: i64) {
        let id = lock(&self.state.accounts)
            .iter()
            .find(|a| a.email == email)
            .map(|a| a.id)
            .expect("Unknown account");
        lock(&self.state.purchases).insert((id, agent_id));
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}
