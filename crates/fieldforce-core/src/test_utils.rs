//! In-memory stand-in for the REST API, used by session and client tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use crate::api::request::{ApiRequest, ApiResponse, Body};
use crate::api::{ApiError, Endpoints, Transport};
use crate::auth::{MemoryTokenStore, SessionEvent, SessionManager, SessionObserver, TokenStore};

pub const BASE_URL: &str = "http://mock.test/api";
pub const PASSWORD: &str = "x";
pub const REFRESH_TOKEN: &str = "refresh-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// New access token, same refresh token.
    Issue,
    /// New access and refresh tokens.
    Rotate,
    /// Refresh token revoked.
    Reject,
    NetworkDown,
}

pub struct MockTransport {
    valid_access: Mutex<String>,
    also_valid: Mutex<Vec<String>>,
    valid_refresh: Mutex<String>,
    refresh_mode: Mutex<RefreshMode>,
    refresh_gate: Option<Arc<Semaphore>>,
    refresh_calls: AtomicUsize,
    unauthorized: AtomicUsize,
    issued: AtomicUsize,
    network_down: AtomicBool,
    reject_all: AtomicBool,
    rate_limited: AtomicUsize,
    routes: Mutex<HashMap<(Method, String), (StatusCode, String)>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            valid_access: Mutex::new("access-0".to_string()),
            also_valid: Mutex::new(Vec::new()),
            valid_refresh: Mutex::new(REFRESH_TOKEN.to_string()),
            refresh_mode: Mutex::new(RefreshMode::Issue),
            refresh_gate: None,
            refresh_calls: AtomicUsize::new(0),
            unauthorized: AtomicUsize::new(0),
            issued: AtomicUsize::new(0),
            network_down: AtomicBool::new(false),
            reject_all: AtomicBool::new(false),
            rate_limited: AtomicUsize::new(0),
            routes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Hold every refresh until the semaphore hands out a permit.
    pub fn with_refresh_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.refresh_gate = Some(gate);
        self
    }

    pub fn endpoints() -> Endpoints {
        Endpoints::new(BASE_URL)
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.refresh_mode.lock().unwrap() = mode;
    }

    pub fn set_network_down(&self, down: bool) {
        self.network_down.store(down, Ordering::SeqCst);
    }

    /// Answer 401 to every protected call, whatever token it carries.
    pub fn set_reject_all(&self, reject: bool) {
        self.reject_all.store(reject, Ordering::SeqCst);
    }

    /// Answer the next `count` protected calls with 429.
    pub fn rate_limit(&self, count: usize) {
        self.rate_limited.store(count, Ordering::SeqCst);
    }

    pub fn respond(&self, method: Method, path: &str, status: StatusCode, body: Value) {
        self.routes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), (status, body.to_string()));
    }

    /// Keep accepting `token` after a refresh replaces the current one.
    pub fn also_accept(&self, token: &str) {
        self.also_valid.lock().unwrap().push(token.to_string());
    }

    pub fn valid_access(&self) -> String {
        self.valid_access.lock().unwrap().clone()
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn unauthorized_count(&self) -> usize {
        self.unauthorized.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Last request sent to `path`.
    pub fn last_request(&self, path: &str) -> ApiRequest {
        let url = format!("{}{}", BASE_URL, path);
        self.requests()
            .into_iter()
            .rev()
            .find(|r| r.url() == url)
            .unwrap_or_else(|| panic!("no request to {}", path))
    }

    /// Bearer tokens carried by the requests to `path`, in order.
    pub fn bearers_for(&self, path: &str) -> Vec<Option<String>> {
        let url = format!("{}{}", BASE_URL, path);
        self.requests()
            .iter()
            .filter(|r| r.url() == url)
            .map(|r| r.bearer().map(str::to_string))
            .collect()
    }

    fn reply(status: StatusCode, body: Value) -> ApiResponse {
        ApiResponse::new(status, body.to_string())
    }

    fn login(&self, request: &ApiRequest) -> ApiResponse {
        let email = json_field(request, "email");
        let password = json_field(request, "password");
        let Some(email) = email else {
            return Self::reply(StatusCode::BAD_REQUEST, json!({"email": ["This field is required."]}));
        };
        if password.as_deref() != Some(PASSWORD) {
            return Self::reply(
                StatusCode::UNAUTHORIZED,
                json!({"detail": "No active account found with the given credentials"}),
            );
        }
        *self.valid_access.lock().unwrap() = "access-login".to_string();
        *self.valid_refresh.lock().unwrap() = REFRESH_TOKEN.to_string();
        Self::reply(
            StatusCode::OK,
            json!({
                "access": "access-login",
                "refresh": REFRESH_TOKEN,
                "user": {"id": 1, "email": email, "first_name": "Asha", "last_name": "Rao", "role": "mr"}
            }),
        )
    }

    async fn refresh(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.refresh_gate {
            let _permit = gate.acquire().await.unwrap();
        }
        assert!(request.bearer().is_none(), "refresh must not carry a bearer token");

        let mode = *self.refresh_mode.lock().unwrap();
        let presented = json_field(request, "refresh");
        let valid = self.valid_refresh.lock().unwrap().clone();
        match mode {
            RefreshMode::NetworkDown => Err(ApiError::Network("connection refused".to_string())),
            RefreshMode::Reject => Ok(Self::reply(
                StatusCode::UNAUTHORIZED,
                json!({"detail": "Token is invalid or expired", "code": "token_not_valid"}),
            )),
            _ if presented.as_deref() != Some(valid.as_str()) => Ok(Self::reply(
                StatusCode::UNAUTHORIZED,
                json!({"detail": "Token is invalid or expired", "code": "token_not_valid"}),
            )),
            RefreshMode::Issue | RefreshMode::Rotate => {
                let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
                let access = format!("access-{}", n);
                *self.valid_access.lock().unwrap() = access.clone();
                if mode == RefreshMode::Rotate {
                    let refresh = format!("refresh-{}", n + 1);
                    *self.valid_refresh.lock().unwrap() = refresh.clone();
                    Ok(Self::reply(StatusCode::OK, json!({"access": access, "refresh": refresh})))
                } else {
                    Ok(Self::reply(StatusCode::OK, json!({"access": access})))
                }
            }
        }
    }

    fn protected(&self, request: &ApiRequest, path: &str) -> Result<ApiResponse, ApiError> {
        if self.network_down.load(Ordering::SeqCst) {
            return Err(ApiError::Network("operation timed out".to_string()));
        }
        let valid = self.valid_access.lock().unwrap().clone();
        let accepted = request.bearer().is_some_and(|bearer| {
            bearer == valid || self.also_valid.lock().unwrap().iter().any(|t| t == bearer)
        });
        if self.reject_all.load(Ordering::SeqCst) || !accepted {
            self.unauthorized.fetch_add(1, Ordering::SeqCst);
            return Ok(Self::reply(
                StatusCode::UNAUTHORIZED,
                json!({"detail": "Given token not valid for any token type", "code": "token_not_valid"}),
            ));
        }
        let throttled = self
            .rate_limited
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if throttled {
            return Ok(Self::reply(StatusCode::TOO_MANY_REQUESTS, json!({"detail": "Request was throttled."})));
        }

        let route = self
            .routes
            .lock()
            .unwrap()
            .get(&(request.method().clone(), path.to_string()))
            .cloned();
        Ok(match route {
            Some((status, body)) => ApiResponse::new(status, body),
            None if path == "/users/me/" => Self::reply(StatusCode::OK, user_json(1, "mr")),
            None => Self::reply(StatusCode::NOT_FOUND, json!({"detail": "Not found."})),
        })
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        let path = request
            .url()
            .strip_prefix(BASE_URL)
            .unwrap_or(request.url())
            .to_string();
        let is_post = *request.method() == Method::POST;
        match path.as_str() {
            "/token/" if is_post => Ok(self.login(request)),
            "/token/refresh/" if is_post => self.refresh(request).await,
            _ => self.protected(request, &path),
        }
    }
}

fn json_field(request: &ApiRequest, key: &str) -> Option<String> {
    match request.body() {
        Body::Json(value) => value.get(key)?.as_str().map(str::to_string),
        _ => None,
    }
}

pub fn user_json(id: i64, role: &str) -> Value {
    json!({
        "id": id,
        "email": format!("user{}@pharma.test", id),
        "first_name": "Asha",
        "last_name": "Rao",
        "role": role
    })
}

/// Observer that records every event.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<SessionEvent>>,
}

impl EventLog {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl SessionObserver for EventLog {
    fn on_event(&self, event: &SessionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub struct Harness {
    pub mock: Arc<MockTransport>,
    pub store: Arc<MemoryTokenStore>,
    pub events: Arc<EventLog>,
    pub manager: Arc<SessionManager>,
}

/// Session over `mock` with the given tokens already stored.
pub fn harness(mock: MockTransport, access: Option<&str>, refresh: Option<&str>) -> Harness {
    let mock = Arc::new(mock);
    let store = Arc::new(match access {
        Some(access) => MemoryTokenStore::with_tokens(access, refresh),
        None => MemoryTokenStore::new(),
    });
    let events = Arc::new(EventLog::default());
    let manager = Arc::new(SessionManager::new(
        mock.clone(),
        MockTransport::endpoints(),
        store.clone(),
        events.clone(),
    ));
    Harness {
        mock,
        store,
        events,
        manager,
    }
}

impl Harness {
    pub fn has_tokens(&self) -> bool {
        self.store.access_token().is_some() || self.store.refresh_token().is_some()
    }
}

/// Yield until `condition` holds, failing the test if it never does.
pub async fn settle_until(condition: impl Fn() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
