use std::fmt;
use std::sync::Mutex;

use crate::models::User;

/// Tokens and profile returned by a successful login.
#[derive(Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: Option<User>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

/// Session state changes published by the session manager.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LoggedIn(Option<User>),
    TokenRefreshed,
    UserLoaded(User),
    /// Profile fetch failed for a reason that does not end the session.
    UserFetchFailed(String),
    /// Explicit logout.
    LoggedOut,
    /// Torn down after an unrecoverable refresh or authorization failure.
    SessionExpired,
}

/// Receives session events. Injected into the manager at construction.
///
/// Called synchronously after the manager releases its internal lock, so an
/// observer may call back into the manager.
pub trait SessionObserver: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}

impl<F> SessionObserver for F
where
    F: Fn(&SessionEvent) + Send + Sync,
{
    fn on_event(&self, event: &SessionEvent) {
        self(event)
    }
}

#[derive(Debug, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_event(&self, _event: &SessionEvent) {}
}

/// Snapshot of what a UI needs to render auth-dependent views.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthSnapshot {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub last_error: Option<String>,
}

/// Observer that folds events into an [`AuthSnapshot`].
#[derive(Debug, Default)]
pub struct AuthState {
    snapshot: Mutex<AuthSnapshot>,
}

impl AuthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a restored session, e.g. tokens found on disk at startup.
    pub fn restored(is_authenticated: bool) -> Self {
        Self {
            snapshot: Mutex::new(AuthSnapshot {
                is_authenticated,
                ..Default::default()
            }),
        }
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn clear_error(&self) {
        self.snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last_error = None;
    }
}

impl SessionObserver for AuthState {
    fn on_event(&self, event: &SessionEvent) {
        let mut state = self
            .snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match event {
            SessionEvent::LoggedIn(user) => {
                state.is_authenticated = true;
                state.last_error = None;
                if user.is_some() {
                    state.user = user.clone();
                }
            }
            SessionEvent::TokenRefreshed => {}
            SessionEvent::UserLoaded(user) => {
                state.user = Some(user.clone());
                state.is_authenticated = true;
                state.last_error = None;
            }
            // Transient failures leave the session as it was
            SessionEvent::UserFetchFailed(message) => {
                state.last_error = Some(message.clone());
            }
            SessionEvent::LoggedOut => {
                *state = AuthSnapshot::default();
            }
            SessionEvent::SessionExpired => {
                state.user = None;
                state.is_authenticated = false;
                state.last_error = Some("Session expired".to_string());
            }
        }
    }
}
