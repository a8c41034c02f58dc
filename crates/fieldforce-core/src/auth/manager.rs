//! Authenticated session maintenance.
//!
//! `SessionManager` owns the token pair and the cached user, attaches the
//! access token to outgoing requests, and recovers from an expired token by
//! refreshing it once and resending the request. Concurrent requests that hit
//! an expired token share a single refresh call.
//!
//! Every session gets a generation number. Login, logout and teardown bump it,
//! and a refresh that completes under an older generation is discarded without
//! touching the token store.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::session::{Session, SessionEvent, SessionObserver};
use super::store::TokenStore;
use super::AuthError;
use crate::api::request::{ApiRequest, ApiResponse};
use crate::api::{ApiError, Endpoints, Transport};
use crate::models::User;

type RefreshFuture = Shared<BoxFuture<'static, Result<String, AuthError>>>;

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
    #[serde(default)]
    user: Option<User>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    /// Present when the server rotates refresh tokens.
    #[serde(default)]
    refresh: Option<String>,
}

#[derive(Default)]
struct SessionState {
    user: Option<User>,
    generation: u64,
    pending_refresh: Option<RefreshFuture>,
}

/// State shared with in-flight refresh futures.
struct SessionCore {
    store: Arc<dyn TokenStore>,
    observer: Arc<dyn SessionObserver>,
    state: Mutex<SessionState>,
}

impl SessionCore {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Forget tokens and user, invalidating any refresh in flight.
    fn end_session(&self, mut state: MutexGuard<'_, SessionState>, event: SessionEvent) {
        state.generation += 1;
        state.pending_refresh = None;
        state.user = None;
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored tokens");
        }
        drop(state);
        self.observer.on_event(&event);
    }

    /// End the session unless it was already replaced since `generation`.
    fn teardown(&self, event: SessionEvent, generation: Option<u64>) -> bool {
        let state = self.lock();
        if generation.is_some_and(|g| g != state.generation) {
            return false;
        }
        self.end_session(state, event);
        true
    }

    fn complete_refresh(
        &self,
        generation: u64,
        outcome: Result<RefreshResponse, AuthError>,
    ) -> Result<String, AuthError> {
        let mut state = self.lock();
        if state.generation != generation {
            // Waiters retry with whatever session replaced this one
            debug!("Discarding token refresh from an ended session");
            drop(state);
            return self.store.access_token().ok_or(AuthError::NotAuthenticated);
        }
        state.pending_refresh = None;

        let tokens = match outcome {
            Ok(tokens) => tokens,
            Err(err) => {
                warn!(error = %err, "Token refresh failed, ending session");
                self.end_session(state, SessionEvent::SessionExpired);
                return Err(err);
            }
        };

        let stored = match tokens.refresh.as_deref() {
            Some(refresh) => self.store.set_tokens(&tokens.access, refresh),
            None => self.store.set_access_token(&tokens.access),
        };
        if let Err(e) = stored {
            warn!(error = %e, "Failed to store refreshed token, ending session");
            self.end_session(state, SessionEvent::SessionExpired);
            return Err(AuthError::Storage(e.to_string()));
        }
        drop(state);

        info!(rotated = tokens.refresh.is_some(), "Access token refreshed");
        self.observer.on_event(&SessionEvent::TokenRefreshed);
        Ok(tokens.access)
    }
}

/// The refresh call itself. Goes straight to the transport: no bearer token,
/// no retry.
async fn run_refresh(
    transport: Arc<dyn Transport>,
    core: Arc<SessionCore>,
    url: String,
    refresh_token: String,
    generation: u64,
) -> Result<String, AuthError> {
    debug!("Requesting new access token");
    let outcome = async {
        let request = ApiRequest::post(url.as_str()).json(&RefreshRequest {
            refresh: &refresh_token,
        })?;
        let response = transport
            .send(&request)
            .await?
            .error_for_status()?;
        response.json::<RefreshResponse>()
    }
    .await
    .map_err(|e: ApiError| AuthError::RefreshFailed(e.to_string()));

    core.complete_refresh(generation, outcome)
}

pub struct SessionManager {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    core: Arc<SessionCore>,
}

impl SessionManager {
    /// Tokens already in `store` are picked up as the current session.
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
        store: Arc<dyn TokenStore>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            transport,
            endpoints,
            core: Arc::new(SessionCore {
                store,
                observer,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Authenticate with email and password, replacing any current session.
    ///
    /// Nothing is stored when the server rejects the credentials.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let request = ApiRequest::post(self.endpoints.login_url())
            .json(&LoginRequest { email, password })?;
        let response = self.transport.send(&request).await?;
        if !response.is_success() {
            warn!(email = email, status = response.status().as_u16(), "Login rejected");
            return Err(AuthError::from_login_response(response.status(), response.text()));
        }
        let tokens: LoginResponse = response.json()?;

        {
            let mut state = self.core.lock();
            state.generation += 1;
            state.pending_refresh = None;
            if let Err(e) = self.core.store.set_tokens(&tokens.access, &tokens.refresh) {
                warn!(error = %e, "Failed to store tokens, discarding login");
                self.core.end_session(state, SessionEvent::LoggedOut);
                return Err(AuthError::Storage(e.to_string()));
            }
            state.user = tokens.user.clone();
        }

        info!(email = email, "Logged in");
        self.core
            .observer
            .on_event(&SessionEvent::LoggedIn(tokens.user.clone()));
        Ok(Session {
            access_token: tokens.access,
            refresh_token: tokens.refresh,
            user: tokens.user,
        })
    }

    /// Drop the session locally. Safe to call when already logged out.
    pub fn logout(&self) {
        self.core.teardown(SessionEvent::LoggedOut, None);
        info!("Logged out");
    }

    pub fn is_authenticated(&self) -> bool {
        self.core.store.access_token().is_some()
    }

    pub fn current_user(&self) -> Option<User> {
        self.core.lock().user.clone()
    }

    /// Set the bearer token on `request` if one is stored.
    pub fn attach_token(&self, mut request: ApiRequest) -> ApiRequest {
        if let Some(token) = self.core.store.access_token() {
            request.set_bearer(token);
        }
        request
    }

    /// Send an authenticated request, refreshing the token once on 401.
    ///
    /// Non-401 error statuses come back as responses for the caller to map.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, AuthError> {
        let request = self.attach_token(request);
        let response = self.transport.send(&request).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(url = request.url(), "Request unauthorized");
            return self.handle_unauthorized(request).await;
        }
        Ok(response)
    }

    /// Recover from a 401 on `failed`: obtain a fresh access token and send
    /// the request one more time.
    ///
    /// A request that was already retried is not retried again; the session
    /// is ended instead.
    pub async fn handle_unauthorized(&self, mut failed: ApiRequest) -> Result<ApiResponse, AuthError> {
        if failed.is_retried() {
            warn!(url = failed.url(), "Still unauthorized after token refresh, ending session");
            self.core.teardown(SessionEvent::SessionExpired, None);
            return Err(AuthError::SessionExpired);
        }

        let token = self.renewed_token(failed.bearer()).await?;
        let generation = self.core.generation();
        failed.mark_retried();
        failed.set_bearer(token);

        let response = self.transport.send(&failed).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(url = failed.url(), "Still unauthorized after token refresh, ending session");
            self.core
                .teardown(SessionEvent::SessionExpired, Some(generation));
            return Err(AuthError::SessionExpired);
        }
        Ok(response)
    }

    /// Force a token refresh, joining one already in flight.
    pub async fn refresh_access_token(&self) -> Result<String, AuthError> {
        let pending = {
            let mut state = self.core.lock();
            match self.pending_or_start(&mut state)? {
                Some(pending) => pending,
                None => {
                    self.core.end_session(state, SessionEvent::SessionExpired);
                    return Err(AuthError::NoRefreshToken);
                }
            }
        };
        pending.await
    }

    /// Load the signed-in user's profile.
    ///
    /// Failures other than an unrecoverable 401 leave the session as it was.
    pub async fn fetch_current_user(&self) -> Result<User, AuthError> {
        let generation = self.core.generation();
        let result = async {
            let response = self
                .execute(ApiRequest::get(self.endpoints.current_user_url()))
                .await?;
            let user: User = response.error_for_status()?.json()?;
            Ok::<_, AuthError>(user)
        }
        .await;

        match result {
            Ok(user) => {
                {
                    let mut state = self.core.lock();
                    if state.generation == generation {
                        state.user = Some(user.clone());
                    }
                }
                debug!(user_id = user.id, "Current user loaded");
                self.core
                    .observer
                    .on_event(&SessionEvent::UserLoaded(user.clone()));
                Ok(user)
            }
            Err(err) => {
                if !err.requires_login() {
                    warn!(error = %err, "Failed to load current user");
                    self.core
                        .observer
                        .on_event(&SessionEvent::UserFetchFailed(err.to_string()));
                }
                Err(err)
            }
        }
    }

    /// Token to retry with after `sent_with` was rejected.
    async fn renewed_token(&self, sent_with: Option<&str>) -> Result<String, AuthError> {
        let pending = {
            let mut state = self.core.lock();
            if let Some(pending) = &state.pending_refresh {
                debug!("Joining token refresh in flight");
                pending.clone()
            } else {
                // Another request finished a refresh after this one was sent
                if let Some(current) = self.core.store.access_token() {
                    if sent_with != Some(current.as_str()) {
                        debug!("Retrying with already renewed token");
                        return Ok(current);
                    }
                }
                match self.pending_or_start(&mut state)? {
                    Some(pending) => pending,
                    None => {
                        // Nothing to renew with; the 401 stands
                        warn!("No refresh token available, ending session");
                        self.core.end_session(state, SessionEvent::SessionExpired);
                        return Err(AuthError::Api(ApiError::Unauthorized));
                    }
                }
            }
        };
        pending.await
    }

    /// Join the refresh in flight or start one. `None` when no refresh
    /// token is stored; an unreadable store leaves the session alone.
    fn pending_or_start(&self, state: &mut SessionState) -> Result<Option<RefreshFuture>, AuthError> {
        if let Some(pending) = &state.pending_refresh {
            return Ok(Some(pending.clone()));
        }
        let refresh_token = match self.core.store.try_refresh_token() {
            Ok(Some(token)) => token,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(error = %e, "Could not read refresh token");
                return Err(AuthError::Storage(e.to_string()));
            }
        };
        info!("Refreshing access token");
        let pending = run_refresh(
            self.transport.clone(),
            self.core.clone(),
            self.endpoints.refresh_url(),
            refresh_token,
            state.generation,
        )
        .boxed()
        .shared();
        state.pending_refresh = Some(pending.clone());
        Ok(Some(pending))
    }
}
