//! Response bodies and stored sessions shaped like the VesselHarbor API's

use serde_json::{Value, json};
use vesselharbor_lib::auth::{Clock, CredentialMode, Credentials, SystemClock};

/// Login or refresh body carrying all three token fields
pub fn token_body(access_token: &str, refresh_token: Option<&str>, expires_in: u64) -> String {
    let mut body = json!({
        "status": "success",
        "access_token": access_token,
        "expires_in": expires_in,
    });
    if let Some(refresh_token) = refresh_token {
        body["refresh_token"] = json!(refresh_token);
    }
    body.to_string()
}

/// A failed login as the server reports it
pub fn login_failure_body(message: &str) -> String {
    json!({ "status": "error", "message": message }).to_string()
}

pub fn resource(id: u64, name: &str, description: Option<&str>) -> Value {
    json!({ "id": id, "name": name, "description": description })
}

/// `{"data": [...]}` list envelope
pub fn list_body(items: &[Value]) -> String {
    json!({ "data": items }).to_string()
}

/// `{"data": {...}}` single-item envelope
pub fn item_body(item: Value) -> String {
    json!({ "data": item }).to_string()
}

pub fn validation_body(message: &str, fields: &[&str]) -> String {
    let errors: Vec<Value> = fields.iter().map(|field| json!({ "field": field })).collect();
    json!({ "detail": message, "errors": errors }).to_string()
}

/// Password-mode session for `api_url` expiring `expires_in` seconds from now
pub fn password_session(
    api_url: &str,
    access_token: &str,
    refresh_token: Option<&str>,
    expires_in: u64,
) -> Credentials {
    Credentials {
        mode: CredentialMode::Password,
        api_url: api_url.to_string(),
        access_token: access_token.to_string(),
        refresh_token: refresh_token.map(str::to_string),
        expires_at: Some(SystemClock.now() + expires_in),
        raw_api_key: None,
    }
}

pub fn api_key_session(api_url: &str, api_key: &str) -> Credentials {
    Credentials {
        mode: CredentialMode::ApiKey,
        api_url: api_url.to_string(),
        access_token: api_key.to_string(),
        refresh_token: None,
        expires_at: None,
        raw_api_key: Some(api_key.to_string()),
    }
}
