//! Hermetic test environment for E2E testing
//!
//! Each environment owns a temporary config directory and a local mockito
//! server standing in for the VesselHarbor API. Sessions built from it use
//! the real file credential store and the real reqwest transport, so a test
//! exercises everything except the terminal.

use anyhow::Result;
use mockito::{Server, ServerGuard};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use vesselharbor_lib::application::cli::Commands;
use vesselharbor_lib::application::commands::execute_command_with_session;
use vesselharbor_lib::application::config::SettingsLayer;
use vesselharbor_lib::application::loader::{ConfigPaths, LoadedConfig};
use vesselharbor_lib::application::session::CommandSession;
use vesselharbor_lib::application::session_mocks::MockInteractiveProvider;
use vesselharbor_lib::auth::{CredentialStore, Credentials, FileCredentialStore, SystemClock};
use vesselharbor_lib::display::MockDisplayProvider;
use vesselharbor_lib::networking::ReqwestTransport;
use vesselharbor_lib::primitives::ExitStatus;

/// Session type used by hermetic tests
pub type HermeticCommandSession = CommandSession<
    MockDisplayProvider,
    MockInteractiveProvider,
    FileCredentialStore,
    ReqwestTransport,
    SystemClock,
>;

/// Isolated config directory plus a local API server
pub struct TestEnvironment {
    /// Temporary directory holding config.toml and the credential store
    pub temp_dir: TempDir,
    pub config_dir: PathBuf,
    /// Stand-in for the VesselHarbor API
    pub server: ServerGuard,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let config_dir = temp_dir.path().join("config");
        fs::create_dir_all(&config_dir)?;

        Ok(Self {
            temp_dir,
            config_dir,
            server: Server::new(),
        })
    }

    pub fn api_url(&self) -> String {
        self.server.url()
    }

    pub fn paths(&self) -> ConfigPaths {
        ConfigPaths::in_dir(&self.config_dir)
    }

    pub fn credential_store(&self) -> FileCredentialStore {
        FileCredentialStore::new(self.paths().credentials_file())
    }

    /// Put a session in the credential store as a previous login would
    pub fn store_session(&self, credentials: &Credentials) -> Result<()> {
        self.credential_store().save(credentials)?;
        Ok(())
    }

    pub fn stored_session(&self) -> Result<Option<Credentials>> {
        Ok(self.credential_store().load()?)
    }

    pub fn write_config(&self, contents: &str) -> Result<()> {
        fs::write(self.paths().config_file(), contents)?;
        Ok(())
    }

    pub fn read_config(&self) -> Result<String> {
        Ok(fs::read_to_string(self.paths().config_file())?)
    }

    /// Start building a session against this environment
    pub fn session(&self) -> HermeticSessionBuilder<'_> {
        HermeticSessionBuilder::new(self)
    }
}

/// Builder for sessions that talk to the environment's server
pub struct HermeticSessionBuilder<'a> {
    env: &'a TestEnvironment,
    env_layer: SettingsLayer,
    flag_layer: SettingsLayer,
    interactive: MockInteractiveProvider,
    point_at_server: bool,
}

impl<'a> HermeticSessionBuilder<'a> {
    fn new(env: &'a TestEnvironment) -> Self {
        Self {
            env,
            env_layer: SettingsLayer::default(),
            flag_layer: SettingsLayer::default(),
            interactive: MockInteractiveProvider::new().non_interactive(),
            point_at_server: true,
        }
    }

    /// Values as if they came from `VESSELHARBOR_*` variables
    pub fn with_env_layer(mut self, layer: SettingsLayer) -> Self {
        self.env_layer = layer;
        self
    }

    /// Values as if they came from command-line flags
    pub fn with_flags(mut self, layer: SettingsLayer) -> Self {
        self.flag_layer = layer;
        self
    }

    pub fn with_password_login(mut self, username: &str, password: &str) -> Self {
        self.env_layer.username = Some(username.to_string());
        self.env_layer.password = Some(password.to_string());
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.env_layer.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_interactive(mut self, interactive: MockInteractiveProvider) -> Self {
        self.interactive = interactive;
        self
    }

    /// Resolve the API URL from the config file alone
    pub fn without_server_url(mut self) -> Self {
        self.point_at_server = false;
        self
    }

    pub fn build(self) -> Result<HermeticSession> {
        let mut env_layer = self.env_layer;
        if self.point_at_server && env_layer.api_url.is_none() {
            env_layer.api_url = Some(self.env.api_url());
        }

        let loaded = LoadedConfig::from_layers(self.env.paths(), &env_layer, &self.flag_layer)?;
        let display = MockDisplayProvider::new();
        let session = CommandSession::new_with_providers(
            loaded,
            display.clone(),
            self.interactive.clone(),
            self.env.credential_store(),
            ReqwestTransport::new(Duration::from_secs(5))?,
            SystemClock,
        );

        Ok(HermeticSession {
            session,
            display,
            prompts: self.interactive,
        })
    }
}

/// A built session plus handles on its recording providers
pub struct HermeticSession {
    pub session: HermeticCommandSession,
    pub display: MockDisplayProvider,
    pub prompts: MockInteractiveProvider,
}

impl HermeticSession {
    pub fn run(&self, command: Commands) -> Result<()> {
        execute_command_with_session(&command, &self.session)
    }

    /// Run and report the process exit status the command would produce
    pub fn run_status(&self, command: Commands) -> ExitStatus {
        match self.run(command) {
            Ok(()) => ExitStatus::Success,
            Err(e) => ExitStatus::from_error(&e),
        }
    }

    /// Everything the command displayed, one entry per line
    pub fn output(&self) -> String {
        self.display.transcript()
    }
}
