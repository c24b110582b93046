//! # vesselharbor Library
//!
//! Command-line client for the VesselHarbor management API.
//!
//! ## Core Modules
//!
//! - [`primitives`] - Error taxonomy, exit status and logging enums
//! - [`logger`] - Structured logging with progress-aware output
//! - [`platform`] - File locks, atomic writes and private permissions
//! - [`application`] - CLI interface, configuration layers and command dispatch
//! - [`auth`] - Stored credentials and the session lifecycle
//! - [`networking`] - HTTP transport and the authenticated request gateway
//! - [`resources`] - Organizations and environments over the API
//! - [`interactive`] - Menu-driven browsing and editing
//! - [`display`] - User-facing output
//!
//! ## Quick Start
//!
//! ```no_run
//! let status = vesselharbor_lib::main();
//! std::process::exit(status.code().into());
//! ```

pub mod application;
pub mod auth;
pub mod display;
pub mod interactive;
pub mod logger;
pub mod networking;
pub mod platform;
pub mod primitives;
pub mod resources;

// Re-export commonly used types for convenience
pub use application::{Cli, CliConfig, Commands, execute_command, execute_command_with_session};
pub use logger::Logger;
pub use primitives::{
    ApiError, AuthError, ConfigError, ExitStatus, HarborError, LogFormat, LogLevel, LogOutput,
    NetworkError,
};

/// Parse the command line, run the command and map the outcome to an exit
/// status. Errors are printed to stderr.
pub fn main() -> ExitStatus {
    let config = match CliConfig::try_from_args(std::env::args_os()) {
        Ok(config) => config,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitStatus::Failure
            } else {
                ExitStatus::Success
            };
        }
    };

    match execute_command(config) {
        Ok(()) => ExitStatus::Success,
        Err(e) => {
            let status = ExitStatus::from_error(&e);
            tracing::debug!(error = ?e, code = status.code(), "command failed");
            eprintln!("{} {e:#}", console::style("error:").red().bold());
            status
        }
    }
}
