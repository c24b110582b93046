use crate::application::config::Settings;
use crate::networking::{ApiRequest, ApiResponse, Method, Transport, error_message};
use crate::primitives::{ApiError, AuthError, ConfigError, HarborError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use super::credentials::{CredentialMode, CredentialStore, Credentials};
use super::tokens::{self, IssuedTokens};

pub const DEFAULT_REFRESH_MARGIN_SECS: u64 = 60;

const LOGIN_PATH: &str = "/login";
const REFRESH_PATH: &str = "/refresh-token";
const API_KEY_HEADER: &str = "X-API-Key";

/// Source of the current time, in unix seconds
pub trait Clock {
    fn now(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
    }
}

/// What to do with a refresh token returned by a refresh call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRotation {
    /// Store the new refresh token when one is issued
    AcceptRotated,
    /// Keep the original refresh token
    KeepExisting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Tokens expiring within this many seconds are refreshed first
    pub safety_margin: u64,
    pub rotation: RefreshRotation,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            safety_margin: DEFAULT_REFRESH_MARGIN_SECS,
            rotation: RefreshRotation::AcceptRotated,
        }
    }
}

impl RefreshPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            safety_margin: settings.refresh_margin_secs,
            rotation: if settings.rotate_refresh_token {
                RefreshRotation::AcceptRotated
            } else {
                RefreshRotation::KeepExisting
            },
        }
    }
}

/// Result of `SessionManager::logout`
#[derive(Debug)]
pub enum LogoutOutcome {
    Cleared,
    /// The stored credentials are still on disk
    Retained(ConfigError),
}

/// Read-only view of the stored session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub mode: Option<CredentialMode>,
    /// seconds until the access token expires; negative once expired
    pub expires_in: Option<i64>,
    pub refreshable: bool,
    /// server the stored session belongs to
    pub api_url: Option<String>,
}

impl SessionStatus {
    fn signed_out() -> Self {
        Self {
            authenticated: false,
            mode: None,
            expires_in: None,
            refreshable: false,
            api_url: None,
        }
    }
}

/// Owns login, refresh, logout and status for one invocation
pub struct SessionManager<'a> {
    store: &'a dyn CredentialStore,
    transport: &'a dyn Transport,
    clock: &'a dyn Clock,
    policy: RefreshPolicy,
}

impl<'a> SessionManager<'a> {
    pub fn new(
        store: &'a dyn CredentialStore,
        transport: &'a dyn Transport,
        clock: &'a dyn Clock,
        policy: RefreshPolicy,
    ) -> Self {
        Self {
            store,
            transport,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    /// Exchange username and password for tokens and persist them
    pub fn login(
        &self,
        settings: &Settings,
        username: &str,
        password: &str,
    ) -> Result<Credentials, HarborError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AuthError::LoginRejected {
                message: "username and password are required".to_string(),
            }
            .into());
        }

        let request = ApiRequest::new(Method::Post, settings.endpoint(LOGIN_PATH)).form(&[
            ("username", username),
            ("password", password),
            ("grant_type", "password"),
        ]);
        let response = self.transport.execute(&request)?;
        reject_failed_login(&response)?;

        let issued = tokens::extract_tokens(&response)
            .map_err(|message| AuthError::LoginRejected { message })?
            .ok_or_else(|| AuthError::LoginRejected {
                message: "the server did not issue an access token".to_string(),
            })?;

        let credentials = self.credentials_from(settings, CredentialMode::Password, issued, None);
        self.store.save(&credentials)?;
        info!(username, api_url = %settings.api_url, "logged in");
        Ok(credentials)
    }

    /// Check the key's format, prove it against the server once, persist it
    pub fn login_with_key(
        &self,
        settings: &Settings,
        api_key: &str,
    ) -> Result<Credentials, HarborError> {
        let api_key = api_key.trim();
        validate_key_format(api_key)?;

        let request = ApiRequest::new(Method::Post, settings.endpoint(LOGIN_PATH))
            .header(API_KEY_HEADER, api_key);
        let response = self.transport.execute(&request)?;

        if matches!(response.status, 400 | 401 | 403) {
            return Err(AuthError::InvalidApiKey {
                reason: response_message(&response)
                    .unwrap_or_else(|| format!("rejected by the server ({})", response.status)),
            }
            .into());
        }
        if !response.is_success() {
            return Err(ApiError::from_response(&response).into());
        }

        let issued = tokens::extract_tokens(&response)
            .map_err(|reason| AuthError::InvalidApiKey { reason })?
            .unwrap_or_else(|| IssuedTokens {
                access_token: api_key.to_string(),
                refresh_token: None,
                expires_in: None,
            });

        let mut credentials = self.credentials_from(
            settings,
            CredentialMode::ApiKey,
            issued,
            Some(api_key.to_string()),
        );
        // Keys do not expire client-side and are never refreshed
        credentials.refresh_token = None;
        credentials.expires_at = None;

        self.store.save(&credentials)?;
        info!(api_url = %settings.api_url, "logged in with API key");
        Ok(credentials)
    }

    /// Return stored credentials that are usable for at least the safety
    /// margin, refreshing them first when needed.
    pub fn ensure_valid(&self, settings: &Settings) -> Result<Credentials, HarborError> {
        let credentials = self.store.load()?.ok_or_else(|| AuthError::NeedsLogin {
            reason: "no stored session".to_string(),
        })?;

        if !credentials.is_for(&settings.api_url) {
            return Err(AuthError::NeedsLogin {
                reason: format!(
                    "the stored session belongs to {}, not {}",
                    credentials.api_url, settings.api_url
                ),
            }
            .into());
        }

        if credentials.mode == CredentialMode::ApiKey {
            return Ok(credentials);
        }

        if !credentials.expires_within(self.clock.now(), self.policy.safety_margin) {
            return Ok(credentials);
        }

        debug!(
            expires_in = ?credentials.expires_in(self.clock.now()),
            "access token inside the safety margin, refreshing"
        );
        self.refresh(settings, &credentials)
    }

    /// Single synchronous refresh attempt.
    ///
    /// A 401 clears the store so the refresh token is never replayed.
    pub fn refresh(
        &self,
        settings: &Settings,
        credentials: &Credentials,
    ) -> Result<Credentials, HarborError> {
        let Some(refresh_token) = credentials.refresh_token.as_deref() else {
            return Err(needs_login("the session expired and cannot be refreshed"));
        };

        let request = ApiRequest::new(Method::Post, settings.endpoint(REFRESH_PATH))
            .header("Authorization", format!("Bearer {refresh_token}"));
        let response = match self.transport.execute(&request) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "token refresh failed");
                return Err(needs_login(&format!("token refresh failed: {e}")));
            }
        };

        if response.status == 401 {
            warn!("refresh token rejected, clearing stored session");
            self.store.clear()?;
            return Err(needs_login("the refresh token was rejected"));
        }
        if !response.is_success() {
            return Err(needs_login(&format!(
                "token refresh failed with status {}",
                response.status
            )));
        }

        let issued = match tokens::extract_tokens(&response) {
            Ok(Some(issued)) => issued,
            Ok(None) => return Err(needs_login("the refresh response carried no access token")),
            Err(message) => return Err(needs_login(&format!("token refresh failed: {message}"))),
        };

        let now = self.clock.now();
        let mut refreshed = self.credentials_from(settings, CredentialMode::Password, issued, None);
        refreshed.api_url = credentials.api_url.clone();
        refreshed.refresh_token = match (self.policy.rotation, refreshed.refresh_token) {
            (RefreshRotation::AcceptRotated, Some(rotated)) => Some(rotated),
            _ => credentials.refresh_token.clone(),
        };

        if refreshed.expires_within(now, self.policy.safety_margin) {
            return Err(needs_login(
                "the refreshed token expires within the safety margin",
            ));
        }

        self.store.save(&refreshed)?;
        debug!(expires_in = ?refreshed.expires_in(now), "access token refreshed");
        Ok(refreshed)
    }

    /// Reactive refresh after the server rejected `credentials` with a 401
    pub fn refresh_rejected(
        &self,
        settings: &Settings,
        credentials: &Credentials,
        path: &str,
    ) -> Result<Credentials, HarborError> {
        match credentials.mode {
            CredentialMode::ApiKey => Err(AuthError::Rejected {
                path: path.to_string(),
            }
            .into()),
            CredentialMode::Password => self.refresh(settings, credentials),
        }
    }

    /// Clear the stored session. Idempotent and never fails; a store that
    /// could not be cleared is reported back to the caller.
    pub fn logout(&self) -> LogoutOutcome {
        match self.store.clear() {
            Ok(()) => {
                info!("logged out");
                LogoutOutcome::Cleared
            }
            Err(e) => {
                warn!(error = %e, "failed to clear stored credentials");
                LogoutOutcome::Retained(e)
            }
        }
    }

    /// Describe the stored session without refreshing it
    pub fn status(&self, settings: &Settings) -> Result<SessionStatus, ConfigError> {
        let Some(credentials) = self.store.load()? else {
            return Ok(SessionStatus::signed_out());
        };

        let now = self.clock.now();
        let refreshable = credentials.refresh_token.is_some();
        let usable = match credentials.mode {
            CredentialMode::ApiKey => true,
            CredentialMode::Password => {
                !credentials.expires_within(now, self.policy.safety_margin) || refreshable
            }
        };

        Ok(SessionStatus {
            authenticated: usable && credentials.is_for(&settings.api_url),
            mode: Some(credentials.mode),
            expires_in: credentials.expires_in(now),
            refreshable,
            api_url: Some(credentials.api_url),
        })
    }

    fn credentials_from(
        &self,
        settings: &Settings,
        mode: CredentialMode,
        issued: IssuedTokens,
        raw_api_key: Option<String>,
    ) -> Credentials {
        Credentials {
            mode,
            api_url: settings.api_url.clone(),
            access_token: issued.access_token,
            refresh_token: issued.refresh_token,
            expires_at: issued
                .expires_in
                .map(|lifetime| self.clock.now().saturating_add(lifetime)),
            raw_api_key,
        }
    }
}

fn needs_login(reason: &str) -> HarborError {
    AuthError::NeedsLogin {
        reason: reason.to_string(),
    }
    .into()
}

fn response_message(response: &ApiResponse) -> Option<String> {
    serde_json::from_str(&response.body)
        .ok()
        .and_then(|body| error_message(&body))
}

/// Credential problems are auth failures; server faults stay API errors
fn reject_failed_login(response: &ApiResponse) -> Result<(), HarborError> {
    if response.is_success() {
        return Ok(());
    }
    if (400..500).contains(&response.status) {
        return Err(AuthError::LoginRejected {
            message: response_message(response)
                .unwrap_or_else(|| format!("the server answered {}", response.status)),
        }
        .into());
    }
    Err(ApiError::from_response(response).into())
}

fn validate_key_format(api_key: &str) -> Result<(), AuthError> {
    if api_key.is_empty() {
        return Err(AuthError::InvalidApiKey {
            reason: "the key is empty".to_string(),
        });
    }
    if api_key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AuthError::InvalidApiKey {
            reason: "the key contains whitespace or control characters".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    include!("manager.test.rs");
}
