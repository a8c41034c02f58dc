/// Default base URL used by the web front end when nothing is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Base URLs for the two halves of the API.
///
/// The token endpoints live under `auth_base`; everything else under
/// `api_base`. A stock deployment serves both from the same prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    auth_base: String,
    api_base: String,
}

impl Endpoints {
    pub fn new(api_base: &str) -> Self {
        Self::with_auth_base(api_base, api_base)
    }

    pub fn with_auth_base(api_base: &str, auth_base: &str) -> Self {
        Self {
            auth_base: auth_base.trim_end_matches('/').to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/{}", self.auth_base, path.trim_start_matches('/'))
    }

    pub fn login_url(&self) -> String {
        self.auth_url("token/")
    }

    pub fn refresh_url(&self) -> String {
        self.auth_url("token/refresh/")
    }

    pub fn current_user_url(&self) -> String {
        self.api_url("users/me/")
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}
