//! Gates for operations that need a signed-in user.

use tracing::debug;

use super::{AuthError, SessionManager};
use crate::models::User;

/// The signed-in user, fetching the profile when it is not cached yet.
///
/// Fails with `NotAuthenticated` without touching the network when no
/// access token is stored.
pub async fn require_session(session: &SessionManager) -> Result<User, AuthError> {
    if !session.is_authenticated() {
        return Err(AuthError::NotAuthenticated);
    }
    if let Some(user) = session.current_user() {
        return Ok(user);
    }
    debug!("No cached user, fetching profile");
    session.fetch_current_user().await
}

/// Like [`require_session`], and the user must also pass `allowed`.
pub async fn require_role<F>(session: &SessionManager, allowed: F) -> Result<User, AuthError>
where
    F: FnOnce(&User) -> bool,
{
    let user = require_session(session).await?;
    if allowed(&user) {
        Ok(user)
    } else {
        Err(AuthError::Forbidden(format!(
            "{} cannot access this resource",
            user.role().display_name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{harness, MockTransport, PASSWORD, REFRESH_TOKEN};

    #[tokio::test]
    async fn test_require_session_without_token() {
        let h = harness(MockTransport::new(), None, None);
        let err = require_session(&h.manager).await.unwrap_err();
        assert!(matches!(err, AuthError::NotAuthenticated));
        assert!(h.mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_require_session_uses_cached_user() {
        let h = harness(MockTransport::new(), None, None);
        h.manager.login("a@b.com", PASSWORD).await.unwrap();

        let user = require_session(&h.manager).await.unwrap();
        assert_eq!(user.email, "a@b.com");
        assert_eq!(h.mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_require_session_fetches_missing_user() {
        // restored from storage with an expired token
        let h = harness(MockTransport::new(), Some("expired"), Some(REFRESH_TOKEN));
        let user = require_session(&h.manager).await.unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(h.mock.refresh_calls(), 1);
        assert!(h.manager.current_user().is_some());
    }

    #[tokio::test]
    async fn test_require_role() {
        let h = harness(MockTransport::new(), None, None);
        h.manager.login("a@b.com", PASSWORD).await.unwrap();

        let err = require_role(&h.manager, User::is_manager).await.unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(ref m) if m.contains("Medical Representative")));
        assert!(require_role(&h.manager, User::is_mr).await.is_ok());
    }
}
