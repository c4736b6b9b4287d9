use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use notes_platform::AuthSession;

/// Tokens expiring within this window should be refreshed before use
pub const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Persisted bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    /// Unix seconds after which the token is no longer accepted
    pub expires_at: i64,
}

impl StoredToken {
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.expires_at
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read token from {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| "failed to parse token JSON")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create token dir {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write token to {}", path.display()))?;
        Ok(())
    }
}

/// Remote store credentials for this process.
///
/// Obtaining a token is someone else's job; the session only remembers the
/// token it was handed, persists it when a store path is set, and stops
/// reporting it once it expires.
pub struct DriveSession {
    token: RwLock<Option<StoredToken>>,
    store_path: Option<PathBuf>,
}

impl DriveSession {
    /// Session that lives in memory only
    pub fn new() -> Self {
        Self {
            token: RwLock::new(None),
            store_path: None,
        }
    }

    /// Session persisted at `path`, restored from it when a live token is there
    pub fn with_store(path: PathBuf) -> Self {
        let session = Self {
            token: RwLock::new(None),
            store_path: Some(path),
        };
        if let Err(e) = session.restore() {
            warn!("could not restore drive session: {:#}", e);
        }
        session
    }

    /// Reload the persisted token. Expired tokens are deleted instead.
    /// Returns whether a usable token was restored.
    pub fn restore(&self) -> Result<bool> {
        let Some(path) = &self.store_path else {
            return Ok(false);
        };
        if !path.exists() {
            return Ok(false);
        }
        let stored = StoredToken::load(path)?;
        if stored.is_expired() {
            info!("discarding expired drive token at {}", path.display());
            self.clear_store()?;
            return Ok(false);
        }
        self.replace(Some(stored));
        Ok(true)
    }

    /// Accept a token obtained elsewhere, valid for `expires_in`
    pub fn sign_in(&self, access_token: impl Into<String>, expires_in: Duration) -> Result<()> {
        let stored = StoredToken {
            access_token: access_token.into(),
            expires_at: Utc::now().timestamp() + expires_in.as_secs() as i64,
        };
        if let Some(path) = &self.store_path {
            stored.save(path)?;
        }
        info!("signed in to drive until {}", stored.expires_at);
        self.replace(Some(stored));
        Ok(())
    }

    /// Forget the token in memory and on disk
    pub fn sign_out(&self) -> Result<()> {
        self.replace(None);
        self.clear_store()?;
        info!("signed out of drive");
        Ok(())
    }

    /// Expiry of the current token in unix seconds
    pub fn expires_at(&self) -> Option<i64> {
        self.current().map(|t| t.expires_at)
    }

    /// True while a live token expires within [`REFRESH_MARGIN`]
    pub fn needs_refresh(&self) -> bool {
        match self.current() {
            Some(token) if !token.is_expired() => {
                Utc::now().timestamp() + REFRESH_MARGIN.as_secs() as i64 >= token.expires_at
            }
            _ => false,
        }
    }

    fn current(&self) -> Option<StoredToken> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace(&self, token: Option<StoredToken>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    fn clear_store(&self) -> Result<()> {
        if let Some(path) = &self.store_path {
            if path.exists() {
                std::fs::remove_file(path)
                    .with_context(|| format!("failed to remove token {}", path.display()))?;
            }
        }
        Ok(())
    }
}

impl Default for DriveSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthSession for DriveSession {
    fn access_token(&self) -> Option<String> {
        self.current()
            .filter(|t| !t.is_expired())
            .map(|t| t.access_token)
    }

    fn is_authenticated(&self) -> bool {
        self.current().map_or(false, |t| !t.is_expired())
    }
}
