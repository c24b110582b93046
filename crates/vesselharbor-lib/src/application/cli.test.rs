use super::*;
use clap::CommandFactory;

#[test]
fn test_cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn test_global_flags_after_subcommand() {
    let config = CliConfig::try_from_args([
        "vesselharbor",
        "org",
        "list",
        "--server",
        "h",
        "-p",
        "9",
        "-u",
        "alice",
    ])
    .unwrap();

    let layer = config.global.settings_layer();
    assert_eq!(layer.server_name.as_deref(), Some("h"));
    assert_eq!(layer.server_port.as_deref(), Some("9"));
    assert_eq!(layer.username.as_deref(), Some("alice"));
    assert_eq!(layer.api_url, None);
    assert_eq!(layer.verbose, None);
    assert!(!layer.has_secrets());
    assert!(matches!(
        config.command,
        Some(Commands::Org {
            command: ResourceCommands::List
        })
    ));
}

#[test]
fn test_environment_requires_org() {
    assert!(CliConfig::try_from_args(["vesselharbor", "environment", "list"]).is_err());

    let config =
        CliConfig::try_from_args(["vesselharbor", "env", "--org", "7", "get", "3"]).unwrap();
    match config.command {
        Some(Commands::Environment { org, command }) => {
            assert_eq!(org, "7");
            assert!(matches!(command, ResourceCommands::Get { ref id } if id == "3"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_verbose_raises_log_floor() {
    let config = CliConfig::try_from_args(["vesselharbor", "-v", "auth", "status"]).unwrap();
    assert_eq!(config.global.settings_layer().verbose, Some(true));

    let logger = config.global.logger_config(true, false);
    assert_eq!(logger.level, LogLevel::Info);

    let config =
        CliConfig::try_from_args(["vesselharbor", "--log-level", "4", "auth", "status"]).unwrap();
    assert_eq!(config.global.logger_config(true, false).level, LogLevel::Trace);
}

#[test]
fn test_contacts_server_and_verbs() {
    let cases = [
        (vec!["vesselharbor", "auth", "login"], true, "auth login"),
        (vec!["vesselharbor", "auth", "login-key", "k"], true, "auth login-key"),
        (vec!["vesselharbor", "auth", "logout"], false, "auth logout"),
        (vec!["vesselharbor", "auth", "status"], false, "auth status"),
        (vec!["vesselharbor", "config", "set-port", "9"], false, "config set-port"),
        (vec!["vesselharbor", "org", "delete", "1"], true, "org delete"),
        (vec!["vesselharbor", "interactive"], true, "interactive"),
    ];
    for (args, contacts_server, verb) in cases {
        let command = CliConfig::try_from_args(args).unwrap().command.unwrap();
        assert_eq!(command.contacts_server(), contacts_server, "{verb}");
        assert_eq!(command.verb(), verb);
    }
}
