//! Session behaviour over real HTTP against an in-process API server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use fieldforce_core::api::{Endpoints, HttpTransport};
use fieldforce_core::auth::{AuthError, AuthState, MemoryTokenStore, SessionManager, TokenStore};
use fieldforce_core::ApiError;

const REFRESH: &str = "refresh-good";

#[derive(Default)]
struct Server {
    valid_access: Mutex<String>,
    issued: AtomicUsize,
    refresh_calls: AtomicUsize,
    refresh_revoked: Mutex<bool>,
}

impl Server {
    /// Invalidate whatever access token clients currently hold.
    fn expire(&self) {
        *self.valid_access.lock().unwrap() = "nobody-has-this".to_string();
    }
}

type Shared = Arc<Server>;

async fn login(State(server): State<Shared>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["password"] != "x" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "No active account found with the given credentials"})),
        );
    }
    *server.valid_access.lock().unwrap() = "access-login".to_string();
    (
        StatusCode::OK,
        Json(json!({
            "access": "access-login",
            "refresh": REFRESH,
            "user": {"id": 1, "email": body["email"], "role": "mr"}
        })),
    )
}

async fn refresh(State(server): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    server.refresh_calls.fetch_add(1, Ordering::SeqCst);
    assert!(headers.get(header::AUTHORIZATION).is_none());
    // Long enough for concurrent 401s to pile up behind this refresh
    tokio::time::sleep(Duration::from_millis(100)).await;

    if *server.refresh_revoked.lock().unwrap() || body["refresh"] != REFRESH {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Token is invalid or expired", "code": "token_not_valid"})),
        );
    }
    let n = server.issued.fetch_add(1, Ordering::SeqCst) + 1;
    let access = format!("access-{}", n);
    *server.valid_access.lock().unwrap() = access.clone();
    (StatusCode::OK, Json(json!({"access": access})))
}

async fn me(State(server): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let expected = format!("Bearer {}", server.valid_access.lock().unwrap());
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if presented != expected {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Given token not valid for any token type"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"id": 1, "email": "a@b.com", "first_name": "Asha", "last_name": "Rao", "role": "mr"})),
    )
}

/// Start a test server on a random port
async fn start_test_server() -> (SocketAddr, Shared) {
    let server = Shared::default();
    let app = Router::new()
        .route("/api/token/", post(login))
        .route("/api/token/refresh/", post(refresh))
        .route("/api/users/me/", get(me))
        .with_state(server.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, server)
}

fn session(addr: SocketAddr, store: Arc<MemoryTokenStore>, state: Arc<AuthState>) -> Arc<SessionManager> {
    let transport = HttpTransport::with_timeout(Duration::from_secs(5)).unwrap();
    Arc::new(SessionManager::new(
        Arc::new(transport),
        Endpoints::new(&format!("http://{}/api", addr)),
        store,
        state,
    ))
}

#[tokio::test]
async fn test_login_then_fetch_profile() {
    let (addr, _server) = start_test_server().await;
    let state = Arc::new(AuthState::new());
    let manager = session(addr, Arc::new(MemoryTokenStore::new()), state.clone());

    let err = manager.login("a@b.com", "wrong").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials(_)));
    assert!(!manager.is_authenticated());

    manager.login("a@b.com", "x").await.unwrap();
    assert!(manager.is_authenticated());
    assert!(state.snapshot().is_authenticated);

    let user = manager.fetch_current_user().await.unwrap();
    assert_eq!(user.full_name(), "Asha Rao");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_expiry_triggers_single_refresh() {
    let (addr, server) = start_test_server().await;
    let store = Arc::new(MemoryTokenStore::new());
    let manager = session(addr, store.clone(), Arc::new(AuthState::new()));
    manager.login("a@b.com", "x").await.unwrap();

    server.expire();
    let calls = (0..8).map(|_| {
        let manager = manager.clone();
        tokio::spawn(async move { manager.fetch_current_user().await })
    });
    for result in futures::future::join_all(calls).await {
        assert_eq!(result.unwrap().unwrap().id, 1);
    }

    assert_eq!(server.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.access_token().as_deref(), Some("access-1"));
    assert_eq!(store.refresh_token().as_deref(), Some(REFRESH));
}

#[tokio::test]
async fn test_revoked_refresh_token_ends_session() {
    let (addr, server) = start_test_server().await;
    let state = Arc::new(AuthState::new());
    let store = Arc::new(MemoryTokenStore::new());
    let manager = session(addr, store.clone(), state.clone());
    manager.login("a@b.com", "x").await.unwrap();

    server.expire();
    *server.refresh_revoked.lock().unwrap() = true;

    let err = manager.fetch_current_user().await.unwrap_err();
    assert!(matches!(err, AuthError::RefreshFailed(_)));
    assert!(!manager.is_authenticated());
    assert!(store.refresh_token().is_none());
    assert!(!state.snapshot().is_authenticated);
}

#[tokio::test]
async fn test_unreachable_server_keeps_session() {
    // Grab a free port, then close it so connections are refused
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let state = Arc::new(AuthState::restored(true));
    let store = Arc::new(MemoryTokenStore::with_tokens("access-0", Some(REFRESH)));
    let manager = session(addr, store, state.clone());

    let err = manager.fetch_current_user().await.unwrap_err();
    assert!(matches!(err, AuthError::Api(ApiError::Network(_))));
    assert!(manager.is_authenticated());
    assert!(state.snapshot().is_authenticated);
}
