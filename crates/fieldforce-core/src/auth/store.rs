//! Persisted token storage.
//!
//! Two string values are kept: the access token under `token` and the
//! refresh token under `refreshToken`. Reads and writes are synchronous;
//! both values are always cleared together.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Storage key of the access token.
pub const ACCESS_TOKEN_KEY: &str = "token";

/// Storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Keychain service name
const SERVICE_NAME: &str = "fieldforce";

pub trait TokenStore: Send + Sync {
    fn access_token(&self) -> Option<String>;

    fn refresh_token(&self) -> Option<String>;

    /// Store a fresh pair, as issued at login.
    fn set_tokens(&self, access: &str, refresh: &str) -> Result<()>;

    /// Replace the access token, keeping the refresh token.
    fn set_access_token(&self, access: &str) -> Result<()>;

    /// Remove both tokens. Succeeds when nothing is stored.
    fn clear(&self) -> Result<()>;

    /// Like `refresh_token`, but a store that can fail to read reports the
    /// failure instead of answering `None`.
    fn try_refresh_token(&self) -> Result<Option<String>> {
        Ok(self.refresh_token())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TokenPair {
    #[serde(rename = "token")]
    access: Option<String>,
    #[serde(rename = "refreshToken")]
    refresh: Option<String>,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
}

fn lock(pair: &Mutex<TokenPair>) -> MutexGuard<'_, TokenPair> {
    pair.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Process-local store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    pair: Mutex<TokenPair>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access: &str, refresh: Option<&str>) -> Self {
        Self {
            pair: Mutex::new(TokenPair {
                access: Some(access.to_string()),
                refresh: refresh.map(str::to_string),
                saved_at: Some(Utc::now()),
            }),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        lock(&self.pair).access.clone()
    }

    fn refresh_token(&self) -> Option<String> {
        lock(&self.pair).refresh.clone()
    }

    fn set_tokens(&self, access: &str, refresh: &str) -> Result<()> {
        let mut pair = lock(&self.pair);
        pair.access = Some(access.to_string());
        pair.refresh = Some(refresh.to_string());
        pair.saved_at = Some(Utc::now());
        Ok(())
    }

    fn set_access_token(&self, access: &str) -> Result<()> {
        let mut pair = lock(&self.pair);
        pair.access = Some(access.to_string());
        pair.saved_at = Some(Utc::now());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *lock(&self.pair) = TokenPair::default();
        Ok(())
    }
}

/// JSON file in the cache directory, kept in memory and rewritten on change.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    pair: Mutex<TokenPair>,
}

impl FileTokenStore {
    /// Open the store in `cache_dir`, loading any saved session.
    pub fn open(cache_dir: &Path) -> Result<Self> {
        let path = cache_dir.join(SESSION_FILE);
        let pair = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .context("Failed to read session file")?;
            serde_json::from_str(&contents).context("Failed to parse session file")?
        } else {
            TokenPair::default()
        };
        debug!(path = %path.display(), has_token = pair.access.is_some(), "Session file loaded");
        Ok(Self {
            path,
            pair: Mutex::new(pair),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, pair: &TokenPair) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(pair)?;
        std::fs::write(&self.path, contents).context("Failed to write session file")?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn access_token(&self) -> Option<String> {
        lock(&self.pair).access.clone()
    }

    fn refresh_token(&self) -> Option<String> {
        lock(&self.pair).refresh.clone()
    }

    fn set_tokens(&self, access: &str, refresh: &str) -> Result<()> {
        let mut pair = lock(&self.pair);
        let updated = TokenPair {
            access: Some(access.to_string()),
            refresh: Some(refresh.to_string()),
            saved_at: Some(Utc::now()),
        };
        // The in-memory pair only changes once the file is written
        self.save(&updated)?;
        *pair = updated;
        Ok(())
    }

    fn set_access_token(&self, access: &str) -> Result<()> {
        let mut pair = lock(&self.pair);
        let updated = TokenPair {
            access: Some(access.to_string()),
            saved_at: Some(Utc::now()),
            ..pair.clone()
        };
        self.save(&updated)?;
        *pair = updated;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *lock(&self.pair) = TokenPair::default();
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// OS keychain, one entry per storage key under the account name.
pub struct KeyringTokenStore {
    account: String,
}

impl KeyringTokenStore {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &format!("{}:{}", self.account, key))
            .context("Failed to create keyring entry")
    }

    fn try_read(&self, key: &str) -> Result<Option<String>> {
        found(self.entry(key)?.get_password())
    }

    /// Read failures are logged and answered as `None`.
    fn read(&self, key: &str) -> Option<String> {
        self.try_read(key).unwrap_or_else(|e| {
            warn!(key = key, error = %e, "Keychain read failed");
            None
        })
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store token in keychain")
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

impl TokenStore for KeyringTokenStore {
    fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    fn set_tokens(&self, access: &str, refresh: &str) -> Result<()> {
        self.write(ACCESS_TOKEN_KEY, access)?;
        if let Err(e) = self.write(REFRESH_TOKEN_KEY, refresh) {
            // Never leave the new access token next to an old refresh token
            if let Err(undo) = self.remove(ACCESS_TOKEN_KEY) {
                warn!(error = %undo, "Failed to roll back access token");
            }
            return Err(e);
        }
        Ok(())
    }

    fn set_access_token(&self, access: &str) -> Result<()> {
        self.write(ACCESS_TOKEN_KEY, access)
    }

    fn try_refresh_token(&self) -> Result<Option<String>> {
        self.try_read(REFRESH_TOKEN_KEY)
    }

    fn clear(&self) -> Result<()> {
        // Attempt both even if the first fails
        let access = self.remove(ACCESS_TOKEN_KEY);
        let refresh = self.remove(REFRESH_TOKEN_KEY);
        access.and(refresh)
    }
}

/// A missing keychain entry is `None`; any other failure is an error.
fn found(result: keyring::Result<String>) -> Result<Option<String>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e).context("Failed to read token from keychain"),
    }
}
