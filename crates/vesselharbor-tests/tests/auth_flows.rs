//! Login, logout, status and refresh against a local API server

use anyhow::Result;
use mockito::Matcher;
use vesselharbor_lib::application::cli::{AuthCommands, Commands, ResourceCommands};
use vesselharbor_lib::auth::CredentialMode;
use vesselharbor_lib::primitives::ExitStatus;
use vesselharbor_tests::TestEnvironment;
use vesselharbor_tests::fixtures::{self, login_failure_body, password_session, token_body};

fn login() -> Commands {
    Commands::Auth {
        command: AuthCommands::Login,
    }
}

fn status() -> Commands {
    Commands::Auth {
        command: AuthCommands::Status,
    }
}

fn logout() -> Commands {
    Commands::Auth {
        command: AuthCommands::Logout,
    }
}

#[test]
fn password_login_persists_session() -> Result<()> {
    let mut env = TestEnvironment::new()?;
    let mock = env
        .server
        .mock("POST", "/login")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("username".into(), "alice".into()),
            Matcher::UrlEncoded("password".into(), "s3cret".into()),
            Matcher::UrlEncoded("grant_type".into(), "password".into()),
        ]))
        .with_status(200)
        .with_body(token_body("access-1", Some("refresh-1"), 3600))
        .create();

    let session = env.session().with_password_login("alice", "s3cret").build()?;
    session.run(login())?;

    mock.assert();
    let stored = env.stored_session()?.expect("session stored");
    assert_eq!(stored.mode, CredentialMode::Password);
    assert_eq!(stored.access_token, "access-1");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(stored.api_url, env.api_url());
    assert!(session.output().contains("Logged in as alice"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn credential_file_is_owner_only() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut env = TestEnvironment::new()?;
    env.server
        .mock("POST", "/login")
        .with_status(200)
        .with_body(token_body("access-1", None, 3600))
        .create();

    env.session()
        .with_password_login("alice", "s3cret")
        .build()?
        .run(login())?;

    let path = env.paths().credentials_file();
    let mode = std::fs::metadata(&path)?.permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
    Ok(())
}

#[test]
fn login_accepts_cookie_tokens() -> Result<()> {
    let mut env = TestEnvironment::new()?;
    env.server
        .mock("POST", "/login")
        .with_status(200)
        .with_header("set-cookie", "access_token=cookie-access; Max-Age=900; HttpOnly")
        .with_header("set-cookie", "refresh_token=cookie-refresh; HttpOnly")
        .with_body("{}")
        .create();

    env.session()
        .with_password_login("alice", "s3cret")
        .build()?
        .run(login())?;

    let stored = env.stored_session()?.expect("session stored");
    assert_eq!(stored.access_token, "cookie-access");
    assert_eq!(stored.refresh_token.as_deref(), Some("cookie-refresh"));
    assert!(stored.expires_at.is_some());
    Ok(())
}

#[test]
fn rejected_login_stores_nothing() -> Result<()> {
    let mut env = TestEnvironment::new()?;
    env.server
        .mock("POST", "/login")
        .with_status(200)
        .with_body(login_failure_body("invalid credentials"))
        .create();

    let session = env.session().with_password_login("alice", "wrong").build()?;
    let err = session.run(login()).unwrap_err();

    assert_eq!(ExitStatus::from_error(&err), ExitStatus::Auth);
    assert!(err.to_string().contains("invalid credentials"));
    assert!(env.stored_session()?.is_none());
    Ok(())
}

#[test]
fn login_prompts_when_username_is_missing() -> Result<()> {
    let mut env = TestEnvironment::new()?;
    env.server
        .mock("POST", "/login")
        .match_body(Matcher::UrlEncoded("username".into(), "carol".into()))
        .with_status(200)
        .with_body(token_body("access-1", None, 3600))
        .create();

    let prompts = vesselharbor_lib::application::session_mocks::MockInteractiveProvider::new()
        .with_text_input("carol")
        .with_password("pw");
    let session = env.session().with_interactive(prompts).build()?;
    session.run(login())?;

    assert_eq!(session.prompts.get_password_calls().len(), 1);
    assert!(env.stored_session()?.is_some());
    Ok(())
}

#[test]
fn api_key_login_uses_key_header() -> Result<()> {
    let mut env = TestEnvironment::new()?;
    let mock = env
        .server
        .mock("POST", "/login")
        .match_header("x-api-key", "key-abc")
        .with_status(200)
        .with_body("{}")
        .create();

    let session = env.session().build()?;
    session.run(Commands::Auth {
        command: AuthCommands::LoginKey {
            key: Some("key-abc".to_string()),
        },
    })?;

    mock.assert();
    let stored = env.stored_session()?.expect("session stored");
    assert_eq!(stored.mode, CredentialMode::ApiKey);
    assert_eq!(stored.expires_at, None);
    Ok(())
}

#[test]
fn logout_then_status_reports_signed_out() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.store_session(&password_session(&env.api_url(), "a", Some("r"), 3600))?;

    let session = env.session().build()?;
    session.run(logout())?;
    session.run(status())?;

    assert!(env.stored_session()?.is_none());
    assert!(!env.paths().credentials_file().exists());
    assert!(session.output().contains("Not logged in"));
    Ok(())
}

#[test]
fn status_does_not_refresh() -> Result<()> {
    let mut env = TestEnvironment::new()?;
    let refresh = env.server.mock("POST", "/refresh-token").expect(0).create();
    env.store_session(&password_session(&env.api_url(), "a", Some("r"), 10))?;

    let session = env.session().build()?;
    session.run(status())?;

    refresh.assert();
    assert!(session.output().contains("Refreshable: yes"));
    Ok(())
}

#[test]
fn expiring_session_is_refreshed_and_rotated() -> Result<()> {
    let mut env = TestEnvironment::new()?;
    env.store_session(&password_session(&env.api_url(), "old-access", Some("old-refresh"), 10))?;
    let refresh = env
        .server
        .mock("POST", "/refresh-token")
        .match_header("authorization", "Bearer old-refresh")
        .with_status(200)
        .with_body(token_body("new-access", Some("new-refresh"), 3600))
        .create();
    let list = env
        .server
        .mock("GET", "/organizations?skip=0&limit=100")
        .match_header("authorization", "Bearer new-access")
        .with_status(200)
        .with_body("[]")
        .create();

    env.session().build()?.run(Commands::Org {
        command: ResourceCommands::List,
    })?;

    refresh.assert();
    list.assert();
    let stored = env.stored_session()?.expect("session stored");
    assert_eq!(stored.access_token, "new-access");
    assert_eq!(stored.refresh_token.as_deref(), Some("new-refresh"));
    Ok(())
}

#[test]
fn rotation_can_be_disabled() -> Result<()> {
    let mut env = TestEnvironment::new()?;
    env.write_config("rotate_refresh_token = false\n")?;
    env.store_session(&password_session(&env.api_url(), "old-access", Some("old-refresh"), 10))?;
    env.server
        .mock("POST", "/refresh-token")
        .with_status(200)
        .with_body(token_body("new-access", Some("new-refresh"), 3600))
        .create();
    env.server
        .mock("GET", "/organizations?skip=0&limit=100")
        .with_status(200)
        .with_body("[]")
        .create();

    env.session().build()?.run(Commands::Org {
        command: ResourceCommands::List,
    })?;

    let stored = env.stored_session()?.expect("session stored");
    assert_eq!(stored.access_token, "new-access");
    assert_eq!(stored.refresh_token.as_deref(), Some("old-refresh"));
    Ok(())
}

#[test]
fn rejected_refresh_clears_the_store() -> Result<()> {
    let mut env = TestEnvironment::new()?;
    env.store_session(&password_session(&env.api_url(), "old-access", Some("revoked"), 10))?;
    env.server
        .mock("POST", "/refresh-token")
        .with_status(401)
        .create();
    let list = env.server.mock("GET", "/organizations?skip=0&limit=100").expect(0).create();

    let status = env.session().build()?.run_status(Commands::Org {
        command: ResourceCommands::List,
    });

    assert_eq!(status, ExitStatus::Auth);
    list.assert();
    assert!(env.stored_session()?.is_none());
    Ok(())
}

#[test]
fn session_for_another_server_is_not_used() -> Result<()> {
    let mut env = TestEnvironment::new()?;
    env.store_session(&fixtures::api_key_session("http://elsewhere:1", "key"))?;
    let list = env.server.mock("GET", "/organizations?skip=0&limit=100").expect(0).create();

    let status = env.session().build()?.run_status(Commands::Org {
        command: ResourceCommands::List,
    });

    assert_eq!(status, ExitStatus::Auth);
    list.assert();
    Ok(())
}
