//! `config` commands against a real config directory

use anyhow::Result;
use vesselharbor_lib::application::cli::{Commands, ConfigCommands, ResourceCommands};
use vesselharbor_lib::application::config::SettingsLayer;
use vesselharbor_lib::primitives::ExitStatus;
use vesselharbor_tests::TestEnvironment;
use vesselharbor_tests::fixtures::password_session;

fn config(command: ConfigCommands) -> Commands {
    Commands::Config { command }
}

#[test]
fn set_url_is_read_back_by_the_next_session() -> Result<()> {
    let env = TestEnvironment::new()?;

    env.session()
        .without_server_url()
        .build()?
        .run(config(ConfigCommands::SetUrl {
            url: "https://harbor.example.com/api".to_string(),
        }))?;

    let next = env.session().without_server_url().build()?;
    next.run(config(ConfigCommands::GetUrl))?;

    assert_eq!(next.display.messages(), vec!["https://harbor.example.com/api"]);
    assert!(env.read_config()?.contains("https://harbor.example.com/api"));
    Ok(())
}

#[test]
fn server_and_port_override_the_stored_url() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_config("api_url = \"http://ignored:1\"\n")?;

    let session = env.session().without_server_url().build()?;
    session.run(config(ConfigCommands::SetServer {
        server_name: "harbor.internal".to_string(),
    }))?;
    session.run(config(ConfigCommands::SetPort {
        port: "8010".to_string(),
    }))?;

    let next = env.session().without_server_url().build()?;
    next.run(config(ConfigCommands::GetUrl))?;
    next.run(config(ConfigCommands::GetServer))?;
    next.run(config(ConfigCommands::GetPort))?;

    assert_eq!(
        next.display.messages(),
        vec!["http://harbor.internal:8010", "harbor.internal", "8010"]
    );
    Ok(())
}

#[test]
fn flags_beat_environment_beat_file() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_config("api_url = \"http://file:1\"\nusername = \"file-user\"\n")?;

    let session = env
        .session()
        .without_server_url()
        .with_env_layer(SettingsLayer {
            api_url: Some("http://env:2".to_string()),
            ..SettingsLayer::default()
        })
        .with_flags(SettingsLayer {
            api_url: Some("http://flag:3".to_string()),
            ..SettingsLayer::default()
        })
        .build()?;
    session.run(config(ConfigCommands::GetUrl))?;

    assert_eq!(session.display.messages(), vec!["http://flag:3"]);
    Ok(())
}

#[test]
fn invalid_port_leaves_the_file_untouched() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_config("server_port = \"8010\"\n")?;

    let status = env
        .session()
        .without_server_url()
        .build()?
        .run_status(config(ConfigCommands::SetPort {
            port: "99999".to_string(),
        }));

    assert_eq!(status, ExitStatus::Config);
    assert_eq!(env.read_config()?, "server_port = \"8010\"\n");
    Ok(())
}

#[test]
fn config_file_never_receives_credentials() -> Result<()> {
    let env = TestEnvironment::new()?;

    env.session()
        .with_password_login("alice", "top-secret")
        .with_api_key("key-secret")
        .build()?
        .run(config(ConfigCommands::SetServer {
            server_name: "h".to_string(),
        }))?;

    let contents = env.read_config()?;
    assert!(!contents.contains("top-secret"));
    assert!(!contents.contains("key-secret"));
    Ok(())
}

#[test]
fn malformed_config_file_is_a_config_error() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_config("server_port = [\n")?;

    assert!(env.session().build().is_err());
    Ok(())
}

#[test]
fn moving_to_another_server_requires_a_new_login() -> Result<()> {
    let mut env = TestEnvironment::new()?;
    env.store_session(&password_session(&env.api_url(), "a", Some("r"), 3600))?;
    let list = env.server.mock("GET", "/organizations?skip=0&limit=100").expect(0).create();

    let status = env
        .session()
        .with_flags(SettingsLayer {
            api_url: Some("http://127.0.0.1:9".to_string()),
            ..SettingsLayer::default()
        })
        .build()?
        .run_status(Commands::Org {
            command: ResourceCommands::List,
        });

    assert_eq!(status, ExitStatus::Auth);
    list.assert();
    Ok(())
}
