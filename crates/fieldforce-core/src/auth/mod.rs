//! Authentication and session management.
//!
//! This module provides:
//! - `SessionManager`: login/logout, bearer attachment and transparent token refresh
//! - `TokenStore`: persisted access/refresh token pair (memory, file, keychain)
//! - `SessionObserver`: injected sink for session events, with `AuthState`
//! - `guard`: checks for operations that require a signed-in user

pub mod error;
pub mod guard;
pub mod manager;
pub mod session;
pub mod store;

pub use error::AuthError;
pub use manager::SessionManager;
pub use session::{AuthSnapshot, AuthState, NoopObserver, Session, SessionEvent, SessionObserver};
pub use store::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
