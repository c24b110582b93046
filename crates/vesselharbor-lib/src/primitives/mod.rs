//! vesselharbor primitives - core types, errors, and exit status mapping
//!
//! Central collection of shared types that form the foundation of the CLI.
//! Every error the library surfaces belongs to one of four families
//! (config, auth, network, api) and each family maps to a stable exit code.

use clap::ValueEnum;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use thiserror::Error;

mod shared;
use shared::value_enum_from_str;

/// Stream the tracing subscriber writes to
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stderr,
    Stdout,
}

/// Diagnostic verbosity, ordered from quietest to noisiest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

/// Line format of diagnostic output
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact single-line records (also `txt`, `plain`)
    #[default]
    Text,
    /// One JSON object per record
    Json,
    /// Multi-line records for reading by eye (also `human`)
    Pretty,
}

/// Logger configuration derived from the effective settings
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub color: bool,
}

// ----- exit status -----

/// Process exit status. The numeric values are part of the CLI contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success = 0,
    Failure = 1,
    Auth = 2,
    Config = 3,
    Network = 4,
    Api = 5,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Pick the exit status for an error by walking its source chain.
    ///
    /// The first recognised library error wins; anything else is a generic
    /// failure.
    pub fn from_error(error: &anyhow::Error) -> Self {
        for cause in error.chain() {
            if let Some(harbor) = cause.downcast_ref::<HarborError>() {
                return harbor.exit_status();
            }
            if cause.downcast_ref::<AuthError>().is_some() {
                return ExitStatus::Auth;
            }
            if cause.downcast_ref::<ConfigError>().is_some() {
                return ExitStatus::Config;
            }
            if cause.downcast_ref::<NetworkError>().is_some() {
                return ExitStatus::Network;
            }
            if cause.downcast_ref::<ApiError>().is_some() {
                return ExitStatus::Api;
            }
        }
        ExitStatus::Failure
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

// ----- error families -----

/// Unresolved or contradictory settings, and local persistence failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read dotenv file '{file}': {source}")]
    EnvFileError {
        file: String,
        source: dotenvy::Error,
    },

    #[error("Invalid VESSELHARBOR_* environment variable: {source}")]
    EnvironmentParsingFailed {
        #[from]
        source: envy::Error,
    },

    #[error("Invalid setting '{value}': {reason}")]
    ParseError { value: String, reason: String },

    #[error(
        "No credentials configured: set a username (VESSELHARBOR_USERNAME) or an API key (VESSELHARBOR_API_KEY), or run 'vesselharbor auth login'"
    )]
    MissingCredentials,

    #[error("Invalid server port '{value}': expected a number between 1 and 65535")]
    InvalidPort { value: String },

    #[error("Could not determine a user configuration directory")]
    ConfigDirUnavailable,

    #[error("Failed to read configuration file {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {}: {source}", path.display())]
    FileParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {source}")]
    FileSerialize {
        #[from]
        source: toml::ser::Error,
    },

    #[error("Credential store at {} is unreadable: {source}", path.display())]
    CredentialStoreCorrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Local storage failure: {source}")]
    Storage {
        #[from]
        source: crate::platform::PlatformError,
    },

    #[error("Interactive mode requires a terminal on stdin and stdout")]
    NotATerminal,
}

/// Login failures and expired, invalid or unrefreshable sessions
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not logged in: {reason}. Run 'vesselharbor auth login' to start a session")]
    NeedsLogin { reason: String },

    #[error("Login failed: {message}")]
    LoginRejected { message: String },

    #[error("Invalid API key: {reason}")]
    InvalidApiKey { reason: String },

    #[error("Request to {path} was rejected after refreshing the session")]
    Rejected { path: String },
}

/// Transport failures
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },

    #[error("HTTP transport error for {url}: {reason}")]
    Transport { url: String, reason: String },
}

impl NetworkError {
    /// Whether a single retry of an idempotent request is worthwhile
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NetworkError::Timeout { .. } | NetworkError::Connection { .. }
        )
    }
}

/// Remote-reported failures; never retried automatically
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation failed: {message}{}", format_fields(fields))]
    Validation {
        message: String,
        fields: Vec<String>,
    },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Unexpected response: {reason}")]
    Decode { reason: String },
}

impl ApiError {
    pub fn fields(&self) -> &[String] {
        match self {
            ApiError::Validation { fields, .. } => fields,
            _ => &[],
        }
    }
}

fn format_fields(fields: &[String]) -> String {
    if fields.is_empty() {
        String::new()
    } else {
        format!(" (fields: {})", fields.join(", "))
    }
}

/// Umbrella error for operations that can fail in more than one family
#[derive(Debug, Error)]
pub enum HarborError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl HarborError {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            HarborError::Config(_) => ExitStatus::Config,
            HarborError::Auth(_) => ExitStatus::Auth,
            HarborError::Network(_) => ExitStatus::Network,
            HarborError::Api(_) => ExitStatus::Api,
        }
    }

    /// Errors that end an interactive run instead of being shown inline
    pub fn is_fatal(&self) -> bool {
        matches!(self, HarborError::Config(_) | HarborError::Auth(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HarborError::Api(ApiError::NotFound { .. }))
    }
}

impl From<crate::platform::PlatformError> for HarborError {
    fn from(source: crate::platform::PlatformError) -> Self {
        HarborError::Config(ConfigError::Storage { source })
    }
}

/// The tracing subscriber could not be installed
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Could not install the log subscriber: {reason}")]
    InitializationFailed { reason: String },

    #[error("A log subscriber is already installed for this process")]
    AlreadyInitialized,
}

impl LogLevel {
    /// `--log-level` number; anything above 4 means trace
    pub fn from_verbosity(verbosity: u8) -> Self {
        match verbosity {
            0 => LogLevel::Error,
            1 => LogLevel::Warning,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            4.. => LogLevel::Trace,
        }
    }

    /// Directive for an `EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl ValueEnum for LogFormat {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Text, Self::Json, Self::Pretty]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Text => Some(
                clap::builder::PossibleValue::new("text")
                    .alias("txt")
                    .alias("plain"),
            ),
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Pretty => Some(clap::builder::PossibleValue::new("pretty").alias("human")),
        }
    }
}

value_enum_from_str!(LogFormat, "log format");
value_enum_from_str!(LogOutput, "log output stream");

#[cfg(test)]
mod tests {
    include!("mod.test.rs");
}
