//! In-process fake of the HR REST backend, served by axum on an ephemeral port.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::app::App;
use crate::config::ClientConfig;
use crate::navigation::History;
use crate::storage::{DurableStorage, MemoryStorage};
use crate::transport::TransportKind;

pub(crate) const PASSWORD: &str = "secret1";
const COOKIE_NAME: &str = "session_token";

#[derive(Default)]
pub(crate) struct BackendState {
    pub logins: AtomicUsize,
    pub logouts: AtomicUsize,
    pub profile_reads: AtomicUsize,
    /// Logout answers 500.
    pub fail_logout: AtomicBool,
    /// Every protected endpoint answers 401.
    pub expired: AtomicBool,
    /// Login omits `accessToken`.
    pub omit_token: AtomicBool,
    pub login_delays: Mutex<HashMap<String, Duration>>,
    /// Logout stalls this long before answering.
    pub logout_delay: Mutex<Option<Duration>>,
    pub last_authorization: Mutex<Option<String>>,
    /// `Cookie` header of the last logout call.
    pub last_logout_cookie: Mutex<Option<String>>,
    pub last_query: Mutex<Option<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct FakeBackend {
    pub base_url: String,
    pub state: Arc<BackendState>,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = router(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Self { base_url: format!("http://{addr}"), state }
    }

    pub fn config(&self, transport: TransportKind) -> ClientConfig {
        ClientConfig::new(&self.base_url).unwrap().with_transport(transport)
    }

    /// Fresh app over in-memory storage.
    pub fn app(&self, transport: TransportKind) -> (App, Arc<History>) {
        self.app_with_storage(transport, Arc::new(MemoryStorage::new()))
    }

    pub fn app_with_storage(&self, transport: TransportKind, storage: Arc<dyn DurableStorage>) -> (App, Arc<History>) {
        Self::bootstrap(&self.config(transport), storage)
    }

    pub fn bootstrap(config: &ClientConfig, storage: Arc<dyn DurableStorage>) -> (App, Arc<History>) {
        let history = Arc::new(History::new());
        let app = App::bootstrap(config, storage, history.clone()).unwrap();
        (app, history)
    }

    pub fn delay_login(&self, identifier: &str, delay: Duration) {
        lock(&self.state.login_delays).insert(identifier.to_owned(), delay);
    }

    pub fn delay_logout(&self, delay: Duration) {
        *lock(&self.state.logout_delay) = Some(delay);
    }

    pub fn logins(&self) -> usize {
        self.state.logins.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.state.logouts.load(Ordering::SeqCst)
    }

    pub fn last_authorization(&self) -> Option<String> {
        lock(&self.state.last_authorization).clone()
    }

    pub fn last_query(&self) -> Option<String> {
        lock(&self.state.last_query).clone()
    }

    pub fn last_logout_cookie(&self) -> Option<String> {
        lock(&self.state.last_logout_cookie).clone()
    }
}

type Shared = Arc<BackendState>;

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/sign-up", post(sign_up))
        .route("/api/auth/logout", post(logout))
        .route("/api/user/profile", get(profile).put(update_profile))
        .route("/employees", get(list_employees))
        .route("/employees/create", post(create_employee))
        .route("/employees/{id}", get(get_employee))
        .route("/attendance/check-in", post(check_in))
        .route("/attendance/check-out", post(check_out))
        .route("/attendance/my", get(my_attendance))
        .route("/attendance/admin", get(admin_attendance))
        .route("/api/leave-requests", post(request_leave))
        .route("/api/leave-requests/my-leaves", get(my_leaves))
        .route("/api/company", get(company).put(update_company))
        .route("/boom", get(boom))
        .route("/teapot", get(teapot))
        .route("/items/{id}", delete(delete_item))
        .with_state(state)
}

// =============================================================================
// AUTH
// =============================================================================

fn role_for(identifier: &str) -> &'static str {
    if identifier.contains('@') { "HR" } else { "EMPLOYEE" }
}

fn user_json(identifier: &str) -> Value {
    json!({ "id": 1, "identifier": identifier, "name": "Test User", "role": role_for(identifier) })
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Session expired", "timestamp": "2026-01-03T10:00:00" })))
        .into_response()
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned)
}

/// Identifier behind the request's bearer header or session cookie.
fn authorize(state: &BackendState, headers: &HeaderMap) -> Result<String, Response> {
    let authorization = header_string(headers, header::AUTHORIZATION);
    *lock(&state.last_authorization) = authorization.clone();

    if state.expired.load(Ordering::SeqCst) {
        return Err(unauthorized());
    }

    let bearer = authorization.and_then(|v| v.strip_prefix("Bearer ").map(str::to_owned));
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| {
            raw.split(';')
                .map(str::trim)
                .find_map(|pair| pair.strip_prefix("session_token="))
                .map(str::to_owned)
        });

    bearer
        .or(cookie)
        .and_then(|token| token.strip_prefix("token-").map(str::to_owned))
        .ok_or_else(unauthorized)
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    state.logins.fetch_add(1, Ordering::SeqCst);
    let identifier = body["identifier"].as_str().unwrap_or_default().to_owned();
    let password = body["password"].as_str().unwrap_or_default();

    let delay = lock(&state.login_delays).get(&identifier).copied();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    if password != PASSWORD {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid email or password" }))).into_response();
    }

    let token = format!("token-{identifier}");
    let mut body = json!({ "message": "Login successful", "user": user_json(&identifier) });
    if !state.omit_token.load(Ordering::SeqCst) {
        body["accessToken"] = json!(token);
    }
    let cookie = format!("{COOKIE_NAME}={token}; Path=/; HttpOnly");
    ([(header::SET_COOKIE, cookie)], Json(body)).into_response()
}

async fn sign_up(Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    if email == "taken@acme.io" {
        return (StatusCode::CONFLICT, Json(json!({ "message": "Email already registered" }))).into_response();
    }
    Json(json!({
        "message": "Company registered",
        "hr": { "id": 9, "email": email, "name": body["name"], "role": "HR", "companyName": body["companyName"] }
    }))
    .into_response()
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> Response {
    state.logouts.fetch_add(1, Ordering::SeqCst);
    *lock(&state.last_authorization) = header_string(&headers, header::AUTHORIZATION);
    *lock(&state.last_logout_cookie) = header_string(&headers, header::COOKIE);
    let delay = *lock(&state.logout_delay);
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if state.fail_logout.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": "Logout failed" }))).into_response();
    }
    let cookie = format!("{COOKIE_NAME}=; Path=/; Max-Age=0");
    ([(header::SET_COOKIE, cookie)], StatusCode::NO_CONTENT).into_response()
}

// =============================================================================
// PROTECTED
// =============================================================================

async fn profile(State(state): State<Shared>, headers: HeaderMap) -> Response {
    state.profile_reads.fetch_add(1, Ordering::SeqCst);
    match authorize(&state, &headers) {
        Ok(identifier) => Json(user_json(&identifier)).into_response(),
        Err(response) => response,
    }
}

async fn update_profile(State(state): State<Shared>, headers: HeaderMap, Json(changes): Json<Value>) -> Response {
    let identifier = match authorize(&state, &headers) {
        Ok(identifier) => identifier,
        Err(response) => return response,
    };
    let mut user = user_json(&identifier);
    if let (Some(user), Some(changes)) = (user.as_object_mut(), changes.as_object()) {
        for (key, value) in changes {
            user.insert(key.clone(), value.clone());
        }
    }
    Json(user).into_response()
}

async fn list_employees(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    Json(json!([
        { "id": 1, "employeeId": "ACJO23001", "firstName": "Jo", "lastName": "Doe", "email": "jo@acme.io" },
        { "id": 2, "employeeId": "ACMA23002", "fullName": "Max Mustermann", "email": "max@acme.io" }
    ]))
    .into_response()
}

async fn get_employee(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    if id == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({ "message": "Employee not found" }))).into_response();
    }
    Json(json!({ "id": 1, "employeeId": id, "firstName": "Jo", "lastName": "Doe", "email": "jo@acme.io" }))
        .into_response()
}

async fn create_employee(State(state): State<Shared>, headers: HeaderMap, Json(mut body): Json<Value>) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    body["id"] = json!(3);
    body["employeeId"] = json!("ACNE26003");
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn check_in(State(state): State<Shared>, headers: HeaderMap) -> Response {
    match authorize(&state, &headers) {
        Ok(_) => "Checked in successfully".into_response(),
        Err(response) => response,
    }
}

async fn check_out(State(state): State<Shared>, headers: HeaderMap) -> Response {
    match authorize(&state, &headers) {
        Ok(_) => StatusCode::OK.into_response(),
        Err(response) => response,
    }
}

async fn my_attendance(State(state): State<Shared>, headers: HeaderMap, RawQuery(query): RawQuery) -> Response {
    *lock(&state.last_query) = query;
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    Json(json!([{ "employeeName": "Test User", "checkIn": "09:00:00", "checkOut": "17:30:00", "workHours": 8.5, "extraHours": 0.5 }]))
        .into_response()
}

async fn admin_attendance(State(state): State<Shared>, headers: HeaderMap, RawQuery(query): RawQuery) -> Response {
    *lock(&state.last_query) = query;
    let identifier = match authorize(&state, &headers) {
        Ok(identifier) => identifier,
        Err(response) => return response,
    };
    if role_for(&identifier) != "HR" {
        return (StatusCode::FORBIDDEN, Json(json!({ "message": "Access denied" }))).into_response();
    }
    Json(json!([
        { "employeeName": "Jo Doe", "checkIn": "09:00:00" },
        { "employeeName": "Max Mustermann" }
    ]))
    .into_response()
}

async fn request_leave(State(state): State<Shared>, headers: HeaderMap, Json(mut body): Json<Value>) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    body["id"] = json!(7);
    body["status"] = json!("PENDING");
    body["numberOfDays"] = json!(2.0);
    Json(body).into_response()
}

async fn my_leaves(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }
    Json(json!({
        "content": [{ "id": 7, "startDate": "2026-01-05", "endDate": "2026-01-06", "leaveType": "SICK_LEAVE", "status": "APPROVED" }],
        "totalElements": 1
    }))
    .into_response()
}

async fn company(State(state): State<Shared>, headers: HeaderMap) -> Response {
    match authorize(&state, &headers) {
        Ok(_) => Json(json!({ "companyName": "Acme", "companyAvatar": null, "industry": "Software" })).into_response(),
        Err(response) => response,
    }
}

async fn update_company(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    match authorize(&state, &headers) {
        Ok(_) => Json(body).into_response(),
        Err(response) => response,
    }
}

async fn boom() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": "Database unavailable" }))).into_response()
}

async fn delete_item(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    match authorize(&state, &headers) {
        Ok(_) => Json(json!({ "deleted": id })).into_response(),
        Err(response) => response,
    }
}

async fn teapot() -> Response {
    (StatusCode::IM_A_TEAPOT, "short and stout").into_response()
}
