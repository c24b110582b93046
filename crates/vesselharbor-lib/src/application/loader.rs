//! Configuration loading
//!
//! Locates the user-scoped directories, reads the config file and `.env`,
//! and runs the resolver over defaults -> file -> env -> flags.

use crate::platform::{self, FileLock};
use crate::primitives::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

use super::cli::GlobalArgs;
use super::config::{self, Settings, SettingsLayer};
use super::env;

const CONFIG_FILE: &str = "config.toml";
const CREDENTIALS_FILE: &str = "credentials.json";

/// User-scoped locations for configuration and session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl ConfigPaths {
    /// An explicit directory holds both the config file and the credential
    /// store; otherwise the platform's config and data directories are used.
    pub fn discover(override_dir: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(dir) = override_dir {
            return Ok(Self::in_dir(dir));
        }

        let dirs = ProjectDirs::from("io", "VesselHarbor", "vesselharbor")
            .ok_or(ConfigError::ConfigDirUnavailable)?;
        Ok(Self {
            config_dir: dirs.config_dir().to_path_buf(),
            data_dir: dirs.data_local_dir().to_path_buf(),
        })
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config_dir: dir.to_path_buf(),
            data_dir: dir.to_path_buf(),
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.data_dir.join(CREDENTIALS_FILE)
    }

    fn config_lock(&self) -> PathBuf {
        self.config_file().with_extension("lock")
    }

    /// Read the file layer; a missing file is an empty layer
    pub fn load_file_layer(&self) -> Result<SettingsLayer, ConfigError> {
        let path = self.config_file();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file");
                return Ok(SettingsLayer::default());
            }
            Err(source) => return Err(ConfigError::FileRead { path, source }),
        };

        toml::from_str(&contents).map_err(|source| ConfigError::FileParse { path, source })
    }

    /// Read-modify-write the config file under the config lock
    pub fn update_file_layer<F>(&self, update: F) -> Result<SettingsLayer, ConfigError>
    where
        F: FnOnce(&mut SettingsLayer),
    {
        let _lock = FileLock::exclusive(&self.config_lock())?;

        let mut layer = self.load_file_layer()?;
        update(&mut layer);

        let rendered = toml::to_string_pretty(&layer)?;
        platform::write_atomic(&self.config_file(), rendered.as_bytes())?;
        tracing::debug!(path = %self.config_file().display(), "saved config file");

        Ok(layer)
    }
}

/// Load `.env` from the working directory into the process environment
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "loaded .env");
            Ok(())
        }
        Err(e) if e.not_found() => Ok(()),
        Err(source) => Err(ConfigError::EnvFileError {
            file: ".env".to_string(),
            source,
        }),
    }
}

/// Effective settings plus where they came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub settings: Settings,
    pub paths: ConfigPaths,
}

impl LoadedConfig {
    /// Load config: defaults -> config file -> .env/env vars -> CLI flags
    pub fn load(global: &GlobalArgs) -> Result<Self, ConfigError> {
        load_dotenv()?;
        let paths = ConfigPaths::discover(global.config_dir.as_deref())?;
        let env_layer = env::settings_from_env()?;
        Self::from_layers(paths, &env_layer, &global.settings_layer())
    }

    /// Resolve against already-read env and flag layers
    pub fn from_layers(
        paths: ConfigPaths,
        env_layer: &SettingsLayer,
        flag_layer: &SettingsLayer,
    ) -> Result<Self, ConfigError> {
        let file_layer = paths.load_file_layer()?;
        let settings = config::resolve(&Settings::default(), &file_layer, env_layer, flag_layer);

        tracing::debug!(api_url = %settings.api_url, "resolved settings");
        Ok(Self { settings, paths })
    }
}

#[cfg(test)]
mod tests {
    include!("loader.test.rs");
}
