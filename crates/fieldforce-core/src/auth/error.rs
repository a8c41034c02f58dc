use reqwest::StatusCode;
use thiserror::Error;

use crate::api::error::ErrorBody;
use crate::api::{ApiError, FieldErrors};

/// Session-level failures.
///
/// Cloneable so that every request waiting on one refresh receives the
/// same outcome.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Login rejected: {0}")]
    Validation(FieldErrors),

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Session expired - please log in again")]
    SessionExpired,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl AuthError {
    /// Map a rejected login response to the error the caller sees.
    pub(crate) fn from_login_response(status: StatusCode, body: &str) -> Self {
        let parsed = ErrorBody::parse(body);
        match status.as_u16() {
            400 if !parsed.fields.is_empty() => AuthError::Validation(parsed.fields),
            401 => AuthError::InvalidCredentials(
                parsed
                    .detail
                    .unwrap_or_else(|| "No active account found with the given credentials".to_string()),
            ),
            _ => match ApiError::from_status(status, body) {
                ApiError::Validation(fields) => AuthError::Validation(fields),
                other => AuthError::LoginFailed(other.to_string()),
            },
        }
    }

    /// True when the session is gone and the user must log in again.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            AuthError::NoRefreshToken
                | AuthError::RefreshFailed(_)
                | AuthError::SessionExpired
                | AuthError::NotAuthenticated
                | AuthError::Api(ApiError::Unauthorized)
        )
    }
}
