//! Environment variable layer
//!
//! `VESSELHARBOR_*` variables feed the "env" precedence layer; the standard
//! colour conventions (`NO_COLOR`, `CLICOLOR`, `FORCE_COLOR`, `CI`) decide
//! whether log output is styled.

use super::config::SettingsLayer;
use crate::primitives::ConfigError;
use serde::Deserialize;

pub const ENV_PREFIX: &str = "VESSELHARBOR_";

/// Read the settings layer from the process environment
pub fn settings_from_env() -> Result<SettingsLayer, ConfigError> {
    settings_from_vars(std::env::vars())
}

/// Read the settings layer from an explicit variable list
pub fn settings_from_vars<I>(vars: I) -> Result<SettingsLayer, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    envy::prefixed(ENV_PREFIX)
        .from_iter(vars)
        .map_err(|source| ConfigError::EnvironmentParsingFailed { source })
}

/// Environment variables that affect terminal styling
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColorEnvironment {
    /// any non-empty value disables colour
    pub no_color: Option<String>,
    /// 0/false disables, 1/2/3/true forces colour
    pub force_color: Option<String>,
    /// 0 disables colour
    pub clicolor: Option<String>,
    /// any value means a CI runner
    pub ci: Option<String>,
}

impl ColorEnvironment {
    pub fn load() -> Result<Self, ConfigError> {
        envy::from_env().map_err(|source| ConfigError::EnvironmentParsingFailed { source })
    }

    /// Precedence: CI < CLICOLOR < NO_COLOR < FORCE_COLOR
    pub fn color_enabled(&self, is_terminal: bool) -> bool {
        let mut enabled = is_terminal && self.ci.is_none();

        if self.clicolor.as_deref() == Some("0") {
            enabled = false;
        }

        if self.no_color.as_deref().is_some_and(|value| !value.is_empty()) {
            enabled = false;
        }

        match self.force_color.as_deref() {
            Some("0" | "false") => enabled = false,
            Some("1" | "2" | "3" | "true") => enabled = true,
            _ => {}
        }

        enabled
    }
}

#[cfg(test)]
mod tests {
    include!("env.test.rs");
}
