//! Effective settings and the four-layer resolver
//!
//! Precedence, lowest to highest, field by field:
//! defaults -> config file -> environment -> command-line flags.

use crate::auth::CredentialMode;
use crate::primitives::ConfigError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Default configuration values
pub mod defaults {
    pub const API_URL: &str = "http://127.0.0.1:8010";
    pub const REFRESH_MARGIN_SECS: u64 = 60;
    pub const TIMEOUT_SECS: u64 = 30;
    pub const ROTATE_REFRESH_TOKEN: bool = true;
}

/// Immutable settings snapshot used for one invocation
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub server_name: String,
    pub server_port: String,
    pub username: String,
    pub password: String,
    pub api_key: String,
    pub verbose: bool,
    pub refresh_margin_secs: u64,
    pub rotate_refresh_token: bool,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: defaults::API_URL.to_string(),
            server_name: String::new(),
            server_port: String::new(),
            username: String::new(),
            password: String::new(),
            api_key: String::new(),
            verbose: false,
            refresh_margin_secs: defaults::REFRESH_MARGIN_SECS,
            rotate_refresh_token: defaults::ROTATE_REFRESH_TOKEN,
            timeout_secs: defaults::TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_url", &self.api_url)
            .field("server_name", &self.server_name)
            .field("server_port", &self.server_port)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("api_key", &redacted(&self.api_key))
            .field("verbose", &self.verbose)
            .field("refresh_margin_secs", &self.refresh_margin_secs)
            .field("rotate_refresh_token", &self.rotate_refresh_token)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() { "<unset>" } else { "<redacted>" }
}

/// One partially-specified configuration source.
///
/// `None` means "not provided by this layer". `Some("")` is an explicit
/// empty value and still overrides lower layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,

    #[serde(
        default,
        deserialize_with = "port_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub server_port: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_margin_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate_refresh_token: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Ports are accepted as either `9` or `"9"`
fn port_value<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Text(String),
        Number(u64),
    }

    Ok(
        Option::<PortValue>::deserialize(deserializer)?.map(|value| match value {
            PortValue::Text(text) => text,
            PortValue::Number(number) => number.to_string(),
        }),
    )
}

impl SettingsLayer {
    /// Overwrite every field this layer provides
    fn apply_to(&self, settings: &mut Settings) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut settings.api_url, &self.api_url);
        set(&mut settings.server_name, &self.server_name);
        set(&mut settings.server_port, &self.server_port);
        set(&mut settings.username, &self.username);
        set(&mut settings.password, &self.password);
        set(&mut settings.api_key, &self.api_key);
        set(&mut settings.verbose, &self.verbose);
        set(&mut settings.refresh_margin_secs, &self.refresh_margin_secs);
        set(&mut settings.rotate_refresh_token, &self.rotate_refresh_token);
        set(&mut settings.timeout_secs, &self.timeout_secs);
    }

    /// Whether the layer carries a secret that must never reach the config file
    pub fn has_secrets(&self) -> bool {
        self.password.is_some() || self.api_key.is_some()
    }
}

/// Merge the four sources into effective settings. Pure: no I/O.
///
/// When `server_name` and `server_port` are both non-empty after the merge,
/// `api_url` is synthesized from them regardless of which layer supplied
/// `api_url`.
pub fn resolve(
    defaults: &Settings,
    file: &SettingsLayer,
    env: &SettingsLayer,
    flags: &SettingsLayer,
) -> Settings {
    let mut settings = defaults.clone();
    for layer in [file, env, flags] {
        layer.apply_to(&mut settings);
    }

    let server_name = settings.server_name.trim();
    let server_port = settings.server_port.trim();
    if !server_name.is_empty() && !server_port.is_empty() {
        settings.api_url = compose_api_url(server_name, server_port);
    }

    settings
}

/// `h` + `9` -> `http://h:9`; a name that already has a scheme keeps it
pub fn compose_api_url(server_name: &str, server_port: &str) -> String {
    let host = server_name.trim_end_matches('/');
    if host.contains("://") {
        format!("{host}:{server_port}")
    } else {
        format!("http://{host}:{server_port}")
    }
}

impl Settings {
    /// Reject values that cannot be used to reach a server
    pub fn validate(&self) -> Result<(), ConfigError> {
        let port = self.server_port.trim();
        if !port.is_empty() {
            parse_port(port)?;
        }

        if self.api_url.trim().is_empty() {
            return Err(ConfigError::ParseError {
                value: self.api_url.clone(),
                reason: "api_url must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Determine the credential mode used to start a session.
    ///
    /// A configured username selects password mode even when an API key is
    /// also present.
    pub fn credential_mode(&self) -> Result<CredentialMode, ConfigError> {
        if !self.username.trim().is_empty() {
            Ok(CredentialMode::Password)
        } else if !self.api_key.trim().is_empty() {
            Ok(CredentialMode::ApiKey)
        } else {
            Err(ConfigError::MissingCredentials)
        }
    }

    /// Absolute URL for an API path
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.api_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

/// Parse a TCP port, rejecting zero and anything above 65535
pub fn parse_port(value: &str) -> Result<u16, ConfigError> {
    match value.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort {
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    include!("config.test.rs");
}
