//! Command session architecture
//!
//! Each command execution creates a session that owns every provider the
//! handlers need. Handlers only see the [`Session`] trait, so tests swap in
//! recording providers without touching the terminal, the network or the
//! user's home directory.

use crate::application::config::Settings;
use crate::application::loader::{ConfigPaths, LoadedConfig};
use crate::auth::{Clock, CredentialStore, FileCredentialStore, SystemClock};
use crate::display::{DisplayProvider, LiveDisplayProvider};
use crate::logger::Logger;
use crate::networking::gateway::DEFAULT_RETRY_DELAY;
use crate::networking::{ReqwestTransport, Transport};
use crate::primitives::{ConfigError, HarborError, LoggerConfig};
use anyhow::{Context, Result};
use std::io::IsTerminal;
use std::time::Duration;

/// Provider trait for interactive user input operations
pub trait InteractiveProvider {
    /// Whether prompts can reach a user at all
    fn is_interactive(&self) -> bool;

    /// Prompt for text input with a default value
    fn text_input(&self, prompt: &str, default: String) -> Result<String>;

    /// Prompt for a secret without echo
    fn password(&self, prompt: &str) -> Result<String>;

    /// Prompt for confirmation (yes/no)
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;

    /// Prompt for selection from a list of options
    fn select(&self, prompt: &str, options: &[&str]) -> Result<usize>;

    /// Returns `None` when the user pressed ESC
    fn fuzzy_select(&self, prompt: &str, options: &[String]) -> Result<Option<usize>>;
}

/// Everything a command handler may touch
pub trait Session {
    fn display(&self) -> &dyn DisplayProvider;

    fn interactive(&self) -> &dyn InteractiveProvider;

    /// Effective settings for this invocation
    fn settings(&self) -> &Settings;

    fn paths(&self) -> &ConfigPaths;

    fn credentials(&self) -> &dyn CredentialStore;

    fn transport(&self) -> &dyn Transport;

    fn clock(&self) -> &dyn Clock;

    /// Pause before retrying an idempotent request
    fn retry_delay(&self) -> Duration {
        DEFAULT_RETRY_DELAY
    }
}

/// dialoguer-backed prompts; refuses to prompt without a terminal
pub struct LiveInteractiveProvider;

impl LiveInteractiveProvider {
    fn is_tty() -> bool {
        std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
    }

    fn require_tty() -> Result<()> {
        if Self::is_tty() {
            Ok(())
        } else {
            Err(ConfigError::NotATerminal.into())
        }
    }
}

impl InteractiveProvider for LiveInteractiveProvider {
    fn is_interactive(&self) -> bool {
        Self::is_tty()
    }

    fn text_input(&self, prompt: &str, default: String) -> Result<String> {
        Self::require_tty()?;

        use dialoguer::Input;

        let mut input = Input::<String>::new().with_prompt(prompt).allow_empty(true);
        if !default.is_empty() {
            input = input.default(default);
        }
        input.interact_text().context("Failed to read text input")
    }

    fn password(&self, prompt: &str) -> Result<String> {
        Self::require_tty()?;

        use dialoguer::Password;

        Password::new()
            .with_prompt(prompt)
            .interact()
            .context("Failed to read password")
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if !Self::is_tty() {
            return Ok(default);
        }

        use dialoguer::Confirm;

        Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
            .context("Failed to read confirmation")
    }

    fn select(&self, prompt: &str, options: &[&str]) -> Result<usize> {
        Self::require_tty()?;

        use dialoguer::Select;

        Select::new()
            .with_prompt(prompt)
            .items(options)
            .default(0)
            .interact()
            .context("Failed to read selection")
    }

    fn fuzzy_select(&self, prompt: &str, options: &[String]) -> Result<Option<usize>> {
        Self::require_tty()?;

        use dialoguer::FuzzySelect;

        FuzzySelect::new()
            .with_prompt(prompt)
            .items(options)
            .max_length(10)
            .interact_opt()
            .context("Failed to read fuzzy selection")
    }
}

/// CommandSession owns all ephemeral state for a single command execution
pub struct CommandSession<D, I, S, T, C>
where
    D: DisplayProvider,
    I: InteractiveProvider,
    S: CredentialStore,
    T: Transport,
    C: Clock,
{
    settings: Settings,
    paths: ConfigPaths,
    display_provider: D,
    interactive_provider: I,
    credential_store: S,
    transport: T,
    clock: C,
    retry_delay: Duration,
}

impl
    CommandSession<
        LiveDisplayProvider,
        LiveInteractiveProvider,
        FileCredentialStore,
        ReqwestTransport,
        SystemClock,
    >
{
    /// Production composition
    pub fn new(loaded: LoadedConfig, logger: LoggerConfig) -> Result<Self, HarborError> {
        if let Err(e) = Logger::ensure(logger) {
            eprintln!("warning: logging unavailable: {e}");
        }

        let transport = ReqwestTransport::new(Duration::from_secs(loaded.settings.timeout_secs))?;
        let credential_store = FileCredentialStore::new(loaded.paths.credentials_file());

        Ok(Self {
            settings: loaded.settings,
            paths: loaded.paths,
            display_provider: LiveDisplayProvider::new(),
            interactive_provider: LiveInteractiveProvider,
            credential_store,
            transport,
            clock: SystemClock,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }
}

impl<D, I, S, T, C> CommandSession<D, I, S, T, C>
where
    D: DisplayProvider,
    I: InteractiveProvider,
    S: CredentialStore,
    T: Transport,
    C: Clock,
{
    /// Create a session with custom providers (for testing)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_with_providers(
        loaded: LoadedConfig,
        display_provider: D,
        interactive_provider: I,
        credential_store: S,
        transport: T,
        clock: C,
    ) -> Self {
        Self {
            settings: loaded.settings,
            paths: loaded.paths,
            display_provider,
            interactive_provider,
            credential_store,
            transport,
            clock,
            retry_delay: Duration::ZERO,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

impl<D, I, S, T, C> Session for CommandSession<D, I, S, T, C>
where
    D: DisplayProvider,
    I: InteractiveProvider,
    S: CredentialStore,
    T: Transport,
    C: Clock,
{
    fn display(&self) -> &dyn DisplayProvider {
        &self.display_provider
    }

    fn interactive(&self) -> &dyn InteractiveProvider {
        &self.interactive_provider
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    fn credentials(&self) -> &dyn CredentialStore {
        &self.credential_store
    }

    fn transport(&self) -> &dyn Transport {
        &self.transport
    }

    fn clock(&self) -> &dyn Clock {
        &self.clock
    }

    fn retry_delay(&self) -> Duration {
        self.retry_delay
    }
}
