//! Command execution handlers
//!
//! Handlers only see [`Session`], so every command can run against the
//! recording providers in `session_mocks`.

use crate::application::cli::{AuthCommands, CliConfig, Commands, ConfigCommands, ResourceCommands};
use crate::application::config::parse_port;
use crate::application::env::ColorEnvironment;
use crate::application::loader::LoadedConfig;
use crate::application::session::{CommandSession, Session};
use crate::auth::{
    CredentialMode, Credentials, LogoutOutcome, RefreshPolicy, SessionManager, SessionStatus,
};
use crate::interactive::TerminalDriver;
use crate::networking::gateway::{ApiSession, RequestGateway};
use crate::primitives::{AuthError, ConfigError, HarborError};
use crate::resources::{
    FieldValues, HttpResourceCatalog, Resource, ResourceCatalog, ResourceKind, missing_required,
};
use anyhow::{Context, Result};
use std::io::IsTerminal;
use tracing::{debug, info};

/// Load configuration, build the production session and run the command
pub fn execute_command(config: CliConfig) -> Result<()> {
    let loaded = LoadedConfig::load(&config.global)?;

    let color = ColorEnvironment::load()
        .map(|env| env.color_enabled(std::io::stderr().is_terminal()))
        .unwrap_or(false);
    console::set_colors_enabled(color);
    console::set_colors_enabled_stderr(color);

    let logger = config.global.logger_config(loaded.settings.verbose, color);
    let session = CommandSession::new(loaded, logger)?;

    let Some(command) = config.command else {
        session
            .display()
            .message("vesselharbor - VesselHarbor management CLI");
        session
            .display()
            .subtle("Run 'vesselharbor --help' for usage information");
        return Ok(());
    };

    execute_command_with_session(&command, &session)
}

/// Execute a specific command with a provided session (for testing)
pub fn execute_command_with_session(command: &Commands, session: &dyn Session) -> Result<()> {
    debug!(command = command.verb(), "executing");

    if command.contacts_server() {
        session.settings().validate()?;
    }

    match command {
        Commands::Auth { command } => match command {
            AuthCommands::Login => handle_login(session),
            AuthCommands::LoginKey { key } => handle_login_key(session, key.as_deref()),
            AuthCommands::Logout => handle_logout(session),
            AuthCommands::Status => handle_status(session),
        },
        Commands::Config { command } => handle_config(session, command),
        Commands::Org { command } => handle_resource(session, ResourceKind::Organization, None, command),
        Commands::Environment { org, command } => {
            handle_resource(session, ResourceKind::Environment, Some(org), command)
        }
        Commands::Interactive => handle_interactive(session),
    }
}

fn session_manager(session: &dyn Session) -> SessionManager<'_> {
    SessionManager::new(
        session.credentials(),
        session.transport(),
        session.clock(),
        RefreshPolicy::from_settings(session.settings()),
    )
}

// ===== AUTH =====

fn handle_login(session: &dyn Session) -> Result<()> {
    let settings = session.settings();
    let prompts = session.interactive();

    let username = if !settings.username.trim().is_empty() {
        settings.username.clone()
    } else if prompts.is_interactive() {
        prompts.text_input("Username", String::new())?
    } else {
        return Err(ConfigError::MissingCredentials.into());
    };

    let password = if !settings.password.is_empty() {
        settings.password.clone()
    } else if prompts.is_interactive() {
        prompts.password("Password")?
    } else {
        return Err(AuthError::LoginRejected {
            message: "no password given; set VESSELHARBOR_PASSWORD or run in a terminal"
                .to_string(),
        }
        .into());
    };

    let manager = session_manager(session);
    manager.login(settings, username.trim(), &password)?;

    session
        .display()
        .success(&format!("Logged in as {} at {}", username.trim(), settings.api_url));
    Ok(())
}

fn handle_login_key(session: &dyn Session, key: Option<&str>) -> Result<()> {
    let settings = session.settings();
    let key = key
        .filter(|key| !key.trim().is_empty())
        .unwrap_or(settings.api_key.as_str());
    if key.trim().is_empty() {
        return Err(ConfigError::MissingCredentials.into());
    }

    let manager = session_manager(session);
    manager.login_with_key(settings, key)?;

    session
        .display()
        .success(&format!("Logged in with API key at {}", settings.api_url));
    Ok(())
}

fn handle_logout(session: &dyn Session) -> Result<()> {
    match session_manager(session).logout() {
        LogoutOutcome::Cleared => session.display().success("Logged out"),
        LogoutOutcome::Retained(e) => session
            .display()
            .warning(&format!("Logged out, but the stored session could not be removed: {e}")),
    }
    Ok(())
}

fn handle_status(session: &dyn Session) -> Result<()> {
    let settings = session.settings();
    let status = session_manager(session).status(settings)?;

    if status.authenticated {
        session.display().success("Authenticated");
    } else {
        session.display().warning("Not logged in");
    }

    let Some(mode) = status.mode else {
        session
            .display()
            .subtle("Run 'vesselharbor auth login' to start a session");
        return Ok(());
    };

    let mode = match mode {
        CredentialMode::Password => "password",
        CredentialMode::ApiKey => "api key",
    };
    let server = status.api_url.clone().unwrap_or_default();
    let expires = describe_expiry(&status);
    let refreshable = if status.refreshable { "yes" } else { "no" };
    session.display().properties(&[
        ("Mode", mode),
        ("Server", server.as_str()),
        ("Expires", expires.as_str()),
        ("Refreshable", refreshable),
    ]);

    if !server.is_empty() && server.trim_end_matches('/') != settings.api_url.trim_end_matches('/') {
        session.display().warning(&format!(
            "The stored session belongs to {server}, not {}",
            settings.api_url
        ));
    }
    Ok(())
}

fn describe_expiry(status: &SessionStatus) -> String {
    match status.expires_in {
        None => "never".to_string(),
        Some(seconds) if seconds <= 0 => "expired".to_string(),
        Some(seconds) => format!("in {seconds}s"),
    }
}

/// Valid credentials for a command that talks to the API.
///
/// With nothing stored, a complete credential from the settings logs in
/// first. With no credential at all the command is misconfigured. A stored
/// session that can no longer be used is never replaced implicitly.
fn authenticate(session: &dyn Session, manager: &SessionManager) -> Result<Credentials, HarborError> {
    let settings = session.settings();
    let had_session = session.credentials().load()?.is_some();
    let err = match manager.ensure_valid(settings) {
        Ok(credentials) => return Ok(credentials),
        Err(err) => err,
    };

    let needs_login = matches!(err, HarborError::Auth(AuthError::NeedsLogin { .. }));
    if had_session || !needs_login {
        return Err(err);
    }

    match settings.credential_mode()? {
        CredentialMode::Password if settings.password.is_empty() => Err(err),
        CredentialMode::Password => {
            info!(username = %settings.username, "no stored session, logging in");
            manager.login(settings, settings.username.trim(), &settings.password)
        }
        CredentialMode::ApiKey => {
            info!("no stored session, logging in with API key");
            manager.login_with_key(settings, &settings.api_key)
        }
    }
}

// ===== CONFIG =====

fn handle_config(session: &dyn Session, command: &ConfigCommands) -> Result<()> {
    let display = session.display();
    let settings = session.settings();

    match command {
        ConfigCommands::SetUrl { url } => {
            let url = url.trim();
            if url.is_empty() {
                return Err(ConfigError::ParseError {
                    value: url.to_string(),
                    reason: "api_url must not be empty".to_string(),
                }
                .into());
            }
            let layer = session
                .paths()
                .update_file_layer(|layer| layer.api_url = Some(url.to_string()))?;
            display.success(&format!("API URL set to {url}"));

            let composed = [&layer.server_name, &layer.server_port]
                .iter()
                .all(|value| value.as_deref().is_some_and(|value| !value.trim().is_empty()));
            if composed {
                display.warning("server_name and server_port are also set and take precedence");
            }
        }
        ConfigCommands::SetServer { server_name } => {
            session
                .paths()
                .update_file_layer(|layer| layer.server_name = Some(server_name.clone()))?;
            display.success(&format!("Server set to {server_name}"));
        }
        ConfigCommands::SetPort { port } => {
            let port = parse_port(port)?;
            session
                .paths()
                .update_file_layer(|layer| layer.server_port = Some(port.to_string()))?;
            display.success(&format!("Port set to {port}"));
        }
        ConfigCommands::GetUrl => display.message(&settings.api_url),
        ConfigCommands::GetServer => display.message(&settings.server_name),
        ConfigCommands::GetPort => display.message(&settings.server_port),
    }
    Ok(())
}

// ===== RESOURCES =====

fn handle_resource(
    session: &dyn Session,
    kind: ResourceKind,
    scope: Option<&str>,
    command: &ResourceCommands,
) -> Result<()> {
    let manager = session_manager(session);
    let credentials = authenticate(session, &manager)?;

    let api_session = ApiSession::new(session.settings().clone());
    api_session.set_credentials(credentials);
    let gateway =
        RequestGateway::new(session.transport(), &manager).with_retry_delay(session.retry_delay());
    let catalog = HttpResourceCatalog::new(&gateway, &api_session);
    let service = catalog.service(kind, scope)?;
    let display = session.display();

    match command {
        ResourceCommands::List => {
            let items = service
                .list()
                .with_context(|| format!("Failed to list {}s", kind))?;
            display.section(&format!("{} ({}):", kind.plural_title(), items.len()));
            for item in &items {
                display.message(&format!("  {}: {}", item.id, item.name));
            }
        }
        ResourceCommands::Get { id } => {
            let resource = service
                .get(id)
                .with_context(|| format!("Failed to fetch {kind} {id}"))?;
            show_resource(session, &resource);
        }
        ResourceCommands::Create { name, description } => {
            let mut fields = FieldValues::new();
            fields.insert("name".to_string(), name.clone());
            if let Some(description) = description {
                fields.insert("description".to_string(), description.clone());
            }
            require_fields(&fields)?;

            let resource = service
                .create(&fields)
                .with_context(|| format!("Failed to create {kind} '{name}'"))?;
            display.success(&format!("Created {kind} '{}'", resource.name));
            show_resource(session, &resource);
        }
        ResourceCommands::Update {
            id,
            name,
            description,
        } => {
            let mut fields = FieldValues::new();
            if let Some(name) = name {
                fields.insert("name".to_string(), name.clone());
                require_fields(&fields)?;
            }
            if let Some(description) = description {
                fields.insert("description".to_string(), description.clone());
            }
            if fields.is_empty() {
                display.warning("Nothing to update; pass --name or --description");
                return Ok(());
            }

            let resource = service
                .update(id, &fields)
                .with_context(|| format!("Failed to update {kind} {id}"))?;
            display.success(&format!("Updated {kind} '{}'", resource.name));
            show_resource(session, &resource);
        }
        ResourceCommands::Delete { id } => {
            service
                .delete(id)
                .with_context(|| format!("Failed to delete {kind} {id}"))?;
            display.success(&format!("Deleted {kind} {id}"));
        }
    }
    Ok(())
}

fn require_fields(fields: &FieldValues) -> Result<()> {
    let missing = missing_required(fields);
    if !missing.is_empty() {
        anyhow::bail!("Required: {}", missing.join(", "));
    }
    Ok(())
}

fn show_resource(session: &dyn Session, resource: &Resource) {
    session.display().properties(&[
        ("ID", resource.id.as_str()),
        ("Name", resource.name.as_str()),
        ("Description", resource.description.as_deref().unwrap_or("")),
    ]);
}

// ===== INTERACTIVE =====

fn handle_interactive(session: &dyn Session) -> Result<()> {
    if !session.interactive().is_interactive() {
        return Err(ConfigError::NotATerminal.into());
    }

    let manager = session_manager(session);
    let credentials = authenticate(session, &manager)?;

    let api_session = ApiSession::new(session.settings().clone());
    api_session.set_credentials(credentials);
    let gateway =
        RequestGateway::new(session.transport(), &manager).with_retry_delay(session.retry_delay());
    let catalog = HttpResourceCatalog::new(&gateway, &api_session);

    let status = TerminalDriver::new(&catalog, session.interactive(), session.display()).run()?;
    debug!(?status, "interactive session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    include!("commands.test.rs");
}
