//! Core library for fieldforce - session management, API client and models.
//!
//! The `SessionManager` keeps the user signed in: it attaches the access
//! token to every request and renews it through a single shared refresh when
//! the server rejects it. `ApiClient` builds typed endpoint calls on top.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::{ApiClient, ApiError, HttpTransport, Transport};
pub use auth::{AuthError, SessionManager};
pub use config::Config;
