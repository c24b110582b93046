//! HTTP plumbing: the request/response model, the transport seam and its
//! blocking reqwest implementation. Authentication lives in [`gateway`].

pub mod gateway;

pub use gateway::{ApiSession, RequestGateway};

use crate::primitives::{ApiError, NetworkError};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::de::DeserializeOwned;
use std::error::Error as _;
use std::time::Duration;
use tracing::{debug, trace};

/// Characters left unescaped in form values and path segments
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode one path segment or form value
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, UNRESERVED).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Idempotent methods may be retried once after a transient failure
    pub fn is_idempotent(self) -> bool {
        matches!(self, Method::Get | Method::Delete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
}

impl RequestBody {
    /// `application/x-www-form-urlencoded` rendering of a form body
    pub fn encode_form(fields: &[(String, String)]) -> String {
        fields
            .iter()
            .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// A fully-addressed HTTP request
#[derive(Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(value));
        self
    }

    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        self.body = Some(RequestBody::Form(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

// Header values carry tokens; keep them out of debug output.
impl std::fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &header_names)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// A received HTTP response, fully buffered
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// names are lowercase
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        self.header_values(name).next()
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Decode the body; an empty body decodes as JSON `null`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let body = if self.body.trim().is_empty() {
            "null"
        } else {
            self.body.as_str()
        };
        serde_json::from_str(body).map_err(|e| ApiError::Decode {
            reason: format!("invalid JSON in {} response: {e}", self.status),
        })
    }
}

/// Human-readable message from an error body (`detail`, `message` or `error`)
pub fn error_message(body: &serde_json::Value) -> Option<String> {
    use serde_json::Value;

    ["detail", "message", "error"].iter().find_map(|key| match body.get(*key) {
        Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
        Some(Value::Object(inner)) => inner
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        Some(Value::Array(items)) => items
            .iter()
            .find_map(|item| item.get("msg").or_else(|| item.get("message")))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    })
}

/// Offending field names from `errors[]`, `detail[]` or `fields[]`
pub fn error_fields(body: &serde_json::Value) -> Vec<String> {
    use serde_json::Value;

    let mut fields: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if !name.is_empty() && !fields.iter().any(|known| known == name) {
            fields.push(name.to_string());
        }
    };

    for key in ["errors", "detail"] {
        for item in body.get(key).and_then(Value::as_array).into_iter().flatten() {
            if let Some(field) = item.get("field").and_then(Value::as_str) {
                push(field);
            } else if let Some(last) = item
                .get("loc")
                .and_then(Value::as_array)
                .and_then(|loc| loc.last())
                .and_then(Value::as_str)
            {
                push(last);
            }
        }
    }

    for field in body.get("fields").and_then(Value::as_array).into_iter().flatten() {
        if let Some(field) = field.as_str() {
            push(field);
        }
    }

    fields
}

impl ApiError {
    /// Classify a non-success response
    pub fn from_response(response: &ApiResponse) -> Self {
        let body: serde_json::Value =
            serde_json::from_str(&response.body).unwrap_or(serde_json::Value::Null);
        let message = error_message(&body).unwrap_or_else(|| {
            let raw = response.body.trim();
            if raw.is_empty() || raw.len() > 200 {
                format!("the server answered {}", response.status)
            } else {
                raw.to_string()
            }
        });

        match response.status {
            404 => ApiError::NotFound { message },
            400 | 409 | 422 => ApiError::Validation {
                message,
                fields: error_fields(&body),
            },
            403 => ApiError::Forbidden { message },
            status => ApiError::Server { status, message },
        }
    }
}

/// The seam between request logic and the wire
pub trait Transport {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, NetworkError>;
}

/// Blocking reqwest transport
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, NetworkError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vesselharbor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NetworkError::Transport {
                url: String::new(),
                reason: e.to_string(),
            })?;
        trace!(timeout_secs = timeout.as_secs(), "HTTP client ready");
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, NetworkError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &request.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Form(fields)) => builder
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(RequestBody::encode_form(fields)),
            None => builder,
        };

        debug!(method = %request.method, url = %request.url, "sending request");
        let response = builder
            .send()
            .map_err(|e| classify(&request.url, &e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect();
        let body = response.text().map_err(|e| classify(&request.url, &e))?;

        debug!(status, url = %request.url, "received response");
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

/// Map a reqwest failure onto the transient / permanent split
fn classify(url: &str, error: &reqwest::Error) -> NetworkError {
    if error.is_timeout() {
        return NetworkError::Timeout {
            url: url.to_string(),
        };
    }

    let reset = std::iter::successors(
        error.source(),
        |cause: &&(dyn std::error::Error + 'static)| (*cause).source(),
    )
    .any(|cause| {
        cause.downcast_ref::<std::io::Error>().is_some_and(|io| {
            matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::TimedOut
            )
        })
    });

    if error.is_connect() || reset {
        NetworkError::Connection {
            url: url.to_string(),
            reason: error.to_string(),
        }
    } else {
        NetworkError::Transport {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    include!("mod.test.rs");
}
