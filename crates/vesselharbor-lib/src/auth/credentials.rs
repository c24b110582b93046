use crate::platform::{self, FileLock};
use crate::primitives::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// How the session authenticates against the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialMode {
    Password,
    ApiKey,
}

impl fmt::Display for CredentialMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialMode::Password => f.write_str("password"),
            CredentialMode::ApiKey => f.write_str("api key"),
        }
    }
}

/// Persisted session material.
///
/// `expires_at` is a unix timestamp in seconds; `None` means the token has
/// no client-visible expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub mode: CredentialMode,
    /// Server the session was issued by
    pub api_url: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_api_key: Option<String>,
}

impl Credentials {
    /// True when the token expires at or before `now + margin`
    pub fn expires_within(&self, now: u64, margin: u64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= now.saturating_add(margin))
    }

    /// Seconds left, negative once expired
    pub fn expires_in(&self, now: u64) -> Option<i64> {
        self.expires_at
            .map(|expires_at| expires_at as i64 - now as i64)
    }

    pub fn is_for(&self, api_url: &str) -> bool {
        self.api_url.trim_end_matches('/') == api_url.trim_end_matches('/')
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("mode", &self.mode)
            .field("api_url", &self.api_url)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("raw_api_key", &self.raw_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Persistence for the current session's credentials
pub trait CredentialStore {
    /// `Ok(None)` when no session has been stored
    fn load(&self) -> Result<Option<Credentials>, ConfigError>;
    fn save(&self, credentials: &Credentials) -> Result<(), ConfigError>;
    /// Removing an absent session succeeds
    fn clear(&self) -> Result<(), ConfigError>;
}

/// JSON file store, owner-only, replaced atomically under an advisory lock
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, ConfigError> {
        let contents = match std::fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::FileRead {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_slice(&contents)
            .map(Some)
            .map_err(|source| ConfigError::CredentialStoreCorrupt {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, credentials: &Credentials) -> Result<(), ConfigError> {
        let rendered = serde_json::to_vec_pretty(credentials).map_err(|source| {
            ConfigError::CredentialStoreCorrupt {
                path: self.path.clone(),
                source,
            }
        })?;

        let _lock = FileLock::exclusive(&self.lock_path())?;
        platform::write_atomic(&self.path, &rendered)?;
        tracing::debug!(path = %self.path.display(), mode = %credentials.mode, "saved credentials");
        Ok(())
    }

    fn clear(&self) -> Result<(), ConfigError> {
        let _lock = FileLock::exclusive(&self.lock_path())?;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "cleared credentials");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ConfigError::Storage {
                source: crate::platform::PlatformError::WriteFailed {
                    path: self.path.clone(),
                    source,
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    include!("credentials.test.rs");
}
