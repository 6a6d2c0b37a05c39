//! Access-token caching.
//!
//! Refreshed access tokens are kept in memory and, when a path is configured,
//! written to disk so the next run can reuse them until they expire.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};

/// Tokens are treated as expired this long before Google says they are.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// An access token and its expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,

    /// When the access token expires; `None` for tokens without a known expiry.
    pub expires_at: Option<DateTime<Utc>>,

    /// When the token was obtained.
    pub last_refresh: DateTime<Utc>,
}

impl TokenInfo {
    /// Creates a token that expires `expires_in_secs` from now.
    pub fn new(access_token: impl Into<String>, expires_in_secs: Option<i64>) -> Self {
        let now = Utc::now();
        Self {
            access_token: access_token.into(),
            expires_at: expires_in_secs
                .map(|secs| now + Duration::seconds(secs) - Duration::seconds(EXPIRY_MARGIN_SECS)),
            last_refresh: now,
        }
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires_at| Utc::now() >= expires_at)
    }

    /// Returns the time until the token expires, if known.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at.map(|expires_at| expires_at - Utc::now())
    }
}

/// In-memory token cache with optional file persistence.
#[derive(Debug, Default)]
pub struct TokenStorage {
    path: Option<PathBuf>,
    token: RwLock<Option<TokenInfo>>,
}

impl TokenStorage {
    /// Creates a cache that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Creates a cache persisted at `path`.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            token: RwLock::new(None),
        }
    }

    /// Loads a previously saved token.
    ///
    /// Returns Ok(true) if a token was loaded, Ok(false) if there was none.
    pub fn load(&self) -> ProviderResult<bool> {
        let Some(path) = self.path.as_deref() else {
            return Ok(false);
        };
        if !path.exists() {
            debug!("no token file at {:?}", path);
            return Ok(false);
        }

        let content = fs::read_to_string(path).map_err(|e| {
            ProviderError::caused_by(ProviderErrorCode::ConfigurationError, "failed to read token file", e)
        })?;
        let token: TokenInfo = serde_json::from_str(&content).map_err(|e| {
            ProviderError::caused_by(ProviderErrorCode::ConfigurationError, "failed to parse token file", e)
        })?;

        info!("loaded cached access token from {:?}", path);
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token);
        Ok(true)
    }

    fn save(&self, token: &TokenInfo) -> ProviderResult<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::caused_by(
                    ProviderErrorCode::ConfigurationError,
                    "failed to create token directory",
                    e,
                )
            })?;
        }

        // Write then rename so a crash never leaves a truncated file.
        let temp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(token)
            .map_err(|e| {
                ProviderError::caused_by(ProviderErrorCode::InternalError, "failed to serialize token", e)
            })?;
        write_private(&temp_path, content.as_bytes()).map_err(|e| {
            ProviderError::caused_by(ProviderErrorCode::ConfigurationError, "failed to write token file", e)
        })?;
        fs::rename(&temp_path, path).map_err(|e| {
            ProviderError::caused_by(ProviderErrorCode::ConfigurationError, "failed to rename token file", e)
        })?;

        debug!("saved access token to {:?}", path);
        Ok(())
    }

    /// Returns a clone of the current token, if any.
    pub fn get(&self) -> Option<TokenInfo> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Returns the current token if it has not expired.
    pub fn valid(&self) -> Option<TokenInfo> {
        self.get().filter(|t| !t.is_expired())
    }

    /// Replaces the current token and persists it.
    ///
    /// The in-memory token is replaced even if persisting it fails.
    pub fn set(&self, token: TokenInfo) -> ProviderResult<()> {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
        self.save(&token)
    }

    /// Drops the current token so the next call refreshes it.
    pub fn invalidate(&self) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Writes `content` to a file only the owner can read, from its creation on.
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // A leftover temp file keeps its old mode; tighten it before writing.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(content)?;
    file.sync_all()
}
