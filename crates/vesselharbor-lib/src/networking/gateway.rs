//! Authenticated request gateway
//!
//! Every call runs `ensure_valid` first, attaches the credential header for
//! the session's mode, and gets one reactive refresh-and-retry on 401.
//! Idempotent methods are retried once after a transient network failure.

use crate::application::config::Settings;
use crate::auth::{CredentialMode, Credentials, SessionManager};
use crate::primitives::{ApiError, AuthError, HarborError, NetworkError};
use std::cell::{Cell, RefCell};
use std::time::Duration;
use tracing::{debug, warn};

use super::{ApiRequest, ApiResponse, Method, Transport};

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

const API_KEY_HEADER: &str = "X-API-Key";

/// Settings plus the credentials in use for one invocation.
///
/// Never persisted; the credential cell is owned by this invocation only.
#[derive(Debug)]
pub struct ApiSession {
    settings: Settings,
    credentials: RefCell<Option<Credentials>>,
    valid: Cell<bool>,
}

impl ApiSession {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            credentials: RefCell::new(None),
            valid: Cell::new(false),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials.borrow().clone()
    }

    pub fn is_valid(&self) -> bool {
        self.valid.get()
    }

    pub fn set_credentials(&self, credentials: Credentials) {
        *self.credentials.borrow_mut() = Some(credentials);
        self.valid.set(true);
    }

    pub fn invalidate(&self) {
        self.valid.set(false);
    }
}

pub struct RequestGateway<'a> {
    transport: &'a dyn Transport,
    manager: &'a SessionManager<'a>,
    retry_delay: Duration,
}

impl<'a> RequestGateway<'a> {
    pub fn new(transport: &'a dyn Transport, manager: &'a SessionManager<'a>) -> Self {
        Self {
            transport,
            manager,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Send an authenticated request; non-2xx answers become `ApiError`
    pub fn send(
        &self,
        session: &ApiSession,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<ApiResponse, HarborError> {
        let credentials = match self.manager.ensure_valid(session.settings()) {
            Ok(credentials) => credentials,
            Err(e) => {
                session.invalidate();
                return Err(e);
            }
        };
        session.set_credentials(credentials.clone());

        let response = self.execute(session, method, path, body, &credentials)?;
        if response.status != 401 {
            return into_result(response);
        }

        debug!(%method, path, "request rejected with 401, refreshing once");
        let refreshed = match self
            .manager
            .refresh_rejected(session.settings(), &credentials, path)
        {
            Ok(refreshed) => refreshed,
            Err(e) => {
                session.invalidate();
                return Err(e);
            }
        };
        session.set_credentials(refreshed.clone());

        let retried = self.execute(session, method, path, body, &refreshed)?;
        if retried.status == 401 {
            warn!(%method, path, "request rejected again after refresh");
            session.invalidate();
            return Err(AuthError::Rejected {
                path: path.to_string(),
            }
            .into());
        }
        into_result(retried)
    }

    /// One attempt, plus one delayed retry for idempotent methods on a
    /// transient failure
    fn execute(
        &self,
        session: &ApiSession,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        credentials: &Credentials,
    ) -> Result<ApiResponse, NetworkError> {
        let request = build_request(session.settings(), method, path, body, credentials);

        match self.transport.execute(&request) {
            Err(e) if method.is_idempotent() && e.is_transient() => {
                warn!(%method, path, error = %e, "transient failure, retrying once");
                std::thread::sleep(self.retry_delay);
                self.transport.execute(&request)
            }
            other => other,
        }
    }
}

fn build_request(
    settings: &Settings,
    method: Method,
    path: &str,
    body: Option<&serde_json::Value>,
    credentials: &Credentials,
) -> ApiRequest {
    let mut request =
        ApiRequest::new(method, settings.endpoint(path)).header("Accept", "application/json");

    request = match credentials.mode {
        CredentialMode::Password => request.header(
            "Authorization",
            format!("Bearer {}", credentials.access_token),
        ),
        CredentialMode::ApiKey => request.header(
            API_KEY_HEADER,
            credentials
                .raw_api_key
                .as_deref()
                .unwrap_or(&credentials.access_token),
        ),
    };

    match body {
        Some(body) => request.json(body.clone()),
        None => request,
    }
}

fn into_result(response: ApiResponse) -> Result<ApiResponse, HarborError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ApiError::from_response(&response).into())
    }
}

#[cfg(test)]
mod tests {
    include!("gateway.test.rs");
}
