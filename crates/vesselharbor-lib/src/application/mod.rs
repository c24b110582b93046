//! Application layer modules
//!
//! CLI surface, configuration layers, command dispatch and the command
//! session that carries every provider a handler may use.

pub mod cli;
pub mod commands;
pub mod config;
pub mod env;
pub mod loader;
pub mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod session_mocks;

// Re-export main types for convenience
pub use cli::{Cli, CliConfig, Commands};
pub use commands::{execute_command, execute_command_with_session};
pub use config::{Settings, SettingsLayer};
pub use loader::{ConfigPaths, LoadedConfig};
pub use session::{CommandSession, InteractiveProvider, Session};
