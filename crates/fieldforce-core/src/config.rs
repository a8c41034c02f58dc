//! Application configuration management.
//!
//! Configuration is stored at `~/.config/fieldforce/config.json`; session
//! tokens and log files live under `~/.cache/fieldforce/`. The API base URLs
//! can be overridden with `FIELDFORCE_API_URL` and `FIELDFORCE_AUTH_URL`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::endpoints::DEFAULT_API_BASE_URL;
use crate::api::transport::REQUEST_TIMEOUT_SECS;
use crate::api::Endpoints;
use crate::auth::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "fieldforce";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const API_URL_ENV: &str = "FIELDFORCE_API_URL";
pub const AUTH_URL_ENV: &str = "FIELDFORCE_AUTH_URL";

/// Keychain account holding the session tokens.
const KEYRING_ACCOUNT: &str = "session";

/// Where session tokens are kept between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    #[default]
    File,
    Keyring,
    /// Not persisted; every run starts logged out.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    /// Token endpoints; the API base is used when unset.
    pub auth_base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub token_store: TokenStoreKind,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            auth_base_url: None,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            token_store: TokenStoreKind::default(),
            last_email: None,
        }
    }
}

impl Config {
    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `FIELDFORCE_*` overrides looked up through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(url) = lookup(AUTH_URL_ENV).filter(|v| !v.is_empty()) {
            self.auth_base_url = Some(url);
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn endpoints(&self) -> Endpoints {
        let auth = self.auth_base_url.as_deref().unwrap_or(&self.api_base_url);
        Endpoints::with_auth_base(&self.api_base_url, auth)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Open the configured token store, rooted in `cache_dir` for file storage.
    pub fn open_token_store(&self, cache_dir: &Path) -> Result<Arc<dyn TokenStore>> {
        Ok(match self.token_store {
            TokenStoreKind::File => Arc::new(FileTokenStore::open(cache_dir)?),
            TokenStoreKind::Keyring => Arc::new(KeyringTokenStore::new(KEYRING_ACCOUNT)),
            TokenStoreKind::Memory => Arc::new(MemoryTokenStore::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.token_store, TokenStoreKind::File);
        assert_eq!(config.endpoints(), Endpoints::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = Config {
            token_store: TokenStoreKind::Memory,
            last_email: Some("a@b.com".into()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.token_store, TokenStoreKind::Memory);
        assert_eq!(loaded.last_email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"token_store": "keyring"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.token_store, TokenStoreKind::Keyring);
        assert_eq!(config.request_timeout_secs, REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_env_overrides_split_auth_base() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            API_URL_ENV => Some("https://sfa.example/api".to_string()),
            AUTH_URL_ENV => Some("https://auth.example".to_string()),
            _ => None,
        });
        let endpoints = config.endpoints();
        assert_eq!(endpoints.login_url(), "https://auth.example/token/");
        assert_eq!(endpoints.current_user_url(), "https://sfa.example/api/users/me/");
    }

    #[test]
    fn test_memory_store_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            token_store: TokenStoreKind::Memory,
            ..Default::default()
        };
        let store = config.open_token_store(dir.path()).unwrap();
        assert!(store.access_token().is_none());
    }
}
