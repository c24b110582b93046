use crate::primitives::{LogFormat, LogLevel, LogOutput, LoggerConfig};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use super::config::SettingsLayer;

const EXIT_CODES: &str = "\
Exit codes:
  0  success
  1  generic failure
  2  authentication error (login failed, session expired or rejected)
  3  configuration error (missing credentials, bad settings, credential store I/O)
  4  network error (timeout, connection failure)
  5  API error (not found, validation, forbidden, server error)";

/// vesselharbor CLI - manage VesselHarbor organizations and environments
#[derive(Debug, Clone, Parser)]
#[command(name = "vesselharbor")]
#[command(about = "Command-line client for the VesselHarbor management API")]
#[command(version)]
#[command(propagate_version = true)]
#[command(after_long_help = EXIT_CODES)]
pub struct Cli {
    /// Global connection and logging options
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Flags accepted by every command. Connection flags form the highest
/// precedence settings layer.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Base URL of the API (ignored when --server and --port are both set)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Server host name; combined with --port into the API URL
    #[arg(short = 'A', long = "server", global = true, value_name = "HOST")]
    pub server_name: Option<String>,

    /// Server port; combined with --server into the API URL
    #[arg(short = 'p', long = "port", global = true, value_name = "PORT")]
    pub server_port: Option<String>,

    /// Username for password authentication
    #[arg(short = 'u', long, global = true)]
    pub username: Option<String>,

    /// API key for key authentication
    #[arg(long, global = true, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Show informational log output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Directory holding config.toml and the credential store
    #[arg(long, global = true, env = "VESSELHARBOR_CONFIG_DIR", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Log level (0=error, 1=warn, 2=info, 3=debug, 4=trace)
    #[arg(long, global = true, env = "VESSELHARBOR_LOG_LEVEL", default_value = "0")]
    pub log_level: u8,

    /// Log format (text, json, pretty)
    #[arg(long, global = true, env = "VESSELHARBOR_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    /// Log output stream (stderr, stdout)
    #[arg(long, global = true, env = "VESSELHARBOR_LOG_OUTPUT", default_value = "stderr")]
    pub log_output: LogOutput,
}

impl GlobalArgs {
    /// The command-line settings layer
    pub fn settings_layer(&self) -> SettingsLayer {
        SettingsLayer {
            api_url: self.api_url.clone(),
            server_name: self.server_name.clone(),
            server_port: self.server_port.clone(),
            username: self.username.clone(),
            api_key: self.api_key.clone(),
            verbose: self.verbose.then_some(true),
            ..SettingsLayer::default()
        }
    }

    /// `verbose` raises the level floor to info
    pub fn logger_config(&self, verbose: bool, color: bool) -> LoggerConfig {
        let mut level = LogLevel::from_verbosity(self.log_level);
        if verbose {
            level = level.max(LogLevel::Info);
        }
        LoggerConfig {
            level,
            format: self.log_format,
            output: self.log_output,
            color,
        }
    }
}

/// Parsed command line
pub struct CliConfig {
    pub global: GlobalArgs,
    pub command: Option<Commands>,
}

impl CliConfig {
    pub fn try_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Cli::try_parse_from(args).map(Self::from)
    }
}

impl From<Cli> for CliConfig {
    fn from(cli: Cli) -> Self {
        Self {
            global: cli.global,
            command: cli.command,
        }
    }
}

/// Available vesselharbor commands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Log in, log out and inspect the stored session
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Read and write the user configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Manage organizations
    Org {
        #[command(subcommand)]
        command: ResourceCommands,
    },

    /// Manage environments of an organization
    #[command(visible_alias = "env")]
    Environment {
        /// Parent organization id
        #[arg(short = 'o', long = "org", value_name = "ORG_ID")]
        org: String,

        #[command(subcommand)]
        command: ResourceCommands,
    },

    /// Browse and edit resources through menus
    Interactive,
}

#[derive(Debug, Clone, Subcommand)]
pub enum AuthCommands {
    /// Log in with username and password (prompts for anything missing)
    Login,

    /// Log in with an API key
    LoginKey {
        /// API key; falls back to --api-key or VESSELHARBOR_API_KEY
        #[arg(value_name = "API_KEY")]
        key: Option<String>,
    },

    /// Remove the stored session
    Logout,

    /// Show the stored session without refreshing it
    Status,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigCommands {
    /// Store the API base URL
    SetUrl { url: String },

    /// Store the server host name
    SetServer { server_name: String },

    /// Store the server port
    SetPort { port: String },

    /// Print the effective API URL
    GetUrl,

    /// Print the effective server host name
    GetServer,

    /// Print the effective server port
    GetPort,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ResourceCommands {
    /// List all resources
    List,

    /// Show one resource
    Get { id: String },

    /// Create a resource
    Create {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Change fields of a resource
    Update {
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Delete a resource
    Delete { id: String },
}

impl Commands {
    /// Whether the command talks to the API, so the connection settings
    /// must be valid before it runs. Local commands stay usable with a bad
    /// port so it can be repaired and the session can still be cleared.
    pub fn contacts_server(&self) -> bool {
        match self {
            Commands::Auth { command } => {
                matches!(command, AuthCommands::Login | AuthCommands::LoginKey { .. })
            }
            Commands::Config { .. } => false,
            Commands::Org { .. } => true,
            Commands::Environment { .. } => true,
            Commands::Interactive => true,
        }
    }

    /// Stable name for logs
    pub fn verb(&self) -> &'static str {
        match self {
            Commands::Auth { command } => match command {
                AuthCommands::Login => "auth login",
                AuthCommands::LoginKey { .. } => "auth login-key",
                AuthCommands::Logout => "auth logout",
                AuthCommands::Status => "auth status",
            },
            Commands::Config { command } => match command {
                ConfigCommands::SetUrl { .. } => "config set-url",
                ConfigCommands::SetServer { .. } => "config set-server",
                ConfigCommands::SetPort { .. } => "config set-port",
                ConfigCommands::GetUrl => "config get-url",
                ConfigCommands::GetServer => "config get-server",
                ConfigCommands::GetPort => "config get-port",
            },
            Commands::Org { command } => match command {
                ResourceCommands::List => "org list",
                ResourceCommands::Get { .. } => "org get",
                ResourceCommands::Create { .. } => "org create",
                ResourceCommands::Update { .. } => "org update",
                ResourceCommands::Delete { .. } => "org delete",
            },
            Commands::Environment { command, .. } => match command {
                ResourceCommands::List => "environment list",
                ResourceCommands::Get { .. } => "environment get",
                ResourceCommands::Create { .. } => "environment create",
                ResourceCommands::Update { .. } => "environment update",
                ResourceCommands::Delete { .. } => "environment delete",
            },
            Commands::Interactive => "interactive",
        }
    }
}

#[cfg(test)]
mod tests {
    include!("cli.test.rs");
}
