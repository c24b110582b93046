//! Token extraction from login and refresh responses.
//!
//! Tokens arrive either in the JSON body (bare or under `data`) or as
//! `access_token` / `refresh_token` cookies with a `Max-Age`.

use crate::networking::{ApiResponse, error_message};
use serde_json::Value;

/// Tokens issued by a login or refresh call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// lifetime in seconds from issue
    pub expires_in: Option<u64>,
}

/// `Err(message)` when the body reports a failure, `Ok(None)` when the
/// response carries no access token.
pub fn extract_tokens(response: &ApiResponse) -> Result<Option<IssuedTokens>, String> {
    let body: Value = serde_json::from_str(&response.body).unwrap_or(Value::Null);
    let payload = body.get("data").filter(|data| data.is_object()).unwrap_or(&body);

    if let Some(status) = body.get("status").and_then(Value::as_str)
        && !status.eq_ignore_ascii_case("success")
    {
        return Err(error_message(&body).unwrap_or_else(|| format!("status '{status}'")));
    }

    let cookies = parse_cookies(response);
    let cookie = |name: &str| cookies.iter().find(|cookie| cookie.name == name);

    let access_token = string_field(payload, "access_token")
        .or_else(|| cookie("access_token").map(|c| c.value.clone()));
    let Some(access_token) = access_token else {
        return Ok(None);
    };

    let refresh_token = string_field(payload, "refresh_token")
        .or_else(|| cookie("refresh_token").map(|c| c.value.clone()));

    let expires_in = payload
        .get("expires_in")
        .and_then(|value| {
            value
                .as_u64()
                .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        })
        .or_else(|| cookie("access_token").and_then(|c| c.max_age));

    Ok(Some(IssuedTokens {
        access_token,
        refresh_token,
        expires_in,
    }))
}

fn string_field(payload: &Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cookie {
    name: String,
    value: String,
    max_age: Option<u64>,
}

fn parse_cookies(response: &ApiResponse) -> Vec<Cookie> {
    response
        .header_values("set-cookie")
        .filter_map(parse_set_cookie)
        .collect()
}

fn parse_set_cookie(header: &str) -> Option<Cookie> {
    let mut parts = header.split(';').map(str::trim);
    let (name, value) = parts.next()?.split_once('=')?;
    let value = value.trim_matches('"');
    if value.is_empty() {
        return None;
    }

    let max_age = parts
        .filter_map(|attribute| attribute.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("max-age"))
        .and_then(|(_, age)| age.trim().parse().ok());

    Some(Cookie {
        name: name.trim().to_string(),
        value: value.to_string(),
        max_age,
    })
}

#[cfg(test)]
mod tests {
    include!("tokens.test.rs");
}
