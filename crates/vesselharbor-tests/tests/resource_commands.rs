//! Organization and environment commands over HTTP

use anyhow::Result;
use mockito::Matcher;
use serde_json::json;
use vesselharbor_lib::application::cli::{Commands, ResourceCommands};
use vesselharbor_lib::primitives::ExitStatus;
use vesselharbor_tests::TestEnvironment;
use vesselharbor_tests::fixtures::{
    api_key_session, item_body, list_body, password_session, resource, token_body,
    validation_body,
};

fn org(command: ResourceCommands) -> Commands {
    Commands::Org { command }
}

fn environment(org: &str, command: ResourceCommands) -> Commands {
    Commands::Environment {
        org: org.to_string(),
        command,
    }
}

fn logged_in() -> Result<TestEnvironment> {
    let env = TestEnvironment::new()?;
    env.store_session(&password_session(&env.api_url(), "access-1", Some("refresh-1"), 3600))?;
    Ok(env)
}

#[test]
fn org_list_prints_every_item() -> Result<()> {
    let mut env = logged_in()?;
    env.server
        .mock("GET", "/organizations?skip=0&limit=100")
        .match_header("authorization", "Bearer access-1")
        .with_status(200)
        .with_body(list_body(&[
            resource(1, "acme", None),
            resource(2, "globex", Some("hank's company")),
        ]))
        .create();

    let session = env.session().build()?;
    session.run(org(ResourceCommands::List))?;

    let output = session.output();
    assert!(output.contains("Organizations (2):"));
    assert!(output.contains("  1: acme"));
    assert!(output.contains("  2: globex"));
    Ok(())
}

#[test]
fn implicit_api_key_login_before_first_call() -> Result<()> {
    let mut env = TestEnvironment::new()?;
    let login = env
        .server
        .mock("POST", "/login")
        .match_header("x-api-key", "key-1")
        .with_status(200)
        .with_body("{}")
        .create();
    let list = env
        .server
        .mock("GET", "/organizations?skip=0&limit=100")
        .match_header("x-api-key", "key-1")
        .with_status(200)
        .with_body("[]")
        .create();

    env.session()
        .with_api_key("key-1")
        .build()?
        .run(org(ResourceCommands::List))?;

    login.assert();
    list.assert();
    assert!(env.stored_session()?.is_some());
    Ok(())
}

#[test]
fn implicit_password_login_before_first_call() -> Result<()> {
    let mut env = TestEnvironment::new()?;
    env.server
        .mock("POST", "/login")
        .with_status(200)
        .with_body(token_body("access-9", Some("refresh-9"), 3600))
        .create();
    let list = env
        .server
        .mock("GET", "/organizations?skip=0&limit=100")
        .match_header("authorization", "Bearer access-9")
        .with_status(200)
        .with_body("[]")
        .create();

    env.session()
        .with_password_login("alice", "pw")
        .build()?
        .run(org(ResourceCommands::List))?;

    list.assert();
    Ok(())
}

#[test]
fn rejected_token_is_refreshed_once_and_retried() -> Result<()> {
    let mut env = logged_in()?;
    let stale = env
        .server
        .mock("GET", "/organizations?skip=0&limit=100")
        .match_header("authorization", "Bearer access-1")
        .with_status(401)
        .expect(1)
        .create();
    let refresh = env
        .server
        .mock("POST", "/refresh-token")
        .match_header("authorization", "Bearer refresh-1")
        .with_status(200)
        .with_body(token_body("access-2", None, 3600))
        .expect(1)
        .create();
    let fresh = env
        .server
        .mock("GET", "/organizations?skip=0&limit=100")
        .match_header("authorization", "Bearer access-2")
        .with_status(200)
        .with_body("[]")
        .expect(1)
        .create();

    env.session().build()?.run(org(ResourceCommands::List))?;

    stale.assert();
    refresh.assert();
    fresh.assert();
    assert_eq!(
        env.stored_session()?.expect("session stored").access_token,
        "access-2"
    );
    Ok(())
}

#[test]
fn api_key_rejection_is_not_refreshed() -> Result<()> {
    let mut env = TestEnvironment::new()?;
    env.store_session(&api_key_session(&env.api_url(), "key-1"))?;
    env.server
        .mock("GET", "/organizations?skip=0&limit=100")
        .with_status(401)
        .expect(1)
        .create();
    let refresh = env.server.mock("POST", "/refresh-token").expect(0).create();

    let status = env.session().build()?.run_status(org(ResourceCommands::List));

    assert_eq!(status, ExitStatus::Auth);
    refresh.assert();
    Ok(())
}

#[test]
fn org_get_shows_details() -> Result<()> {
    let mut env = logged_in()?;
    env.server
        .mock("GET", "/organizations/42")
        .with_status(200)
        .with_header("etag", "\"v3\"")
        .with_body(item_body(resource(42, "initech", Some("tps reports"))))
        .create();

    let session = env.session().build()?;
    session.run(org(ResourceCommands::Get {
        id: "42".to_string(),
    }))?;

    let output = session.output();
    assert!(output.contains("ID: 42"));
    assert!(output.contains("Name: initech"));
    assert!(output.contains("Description: tps reports"));
    Ok(())
}

#[test]
fn org_get_unknown_is_api_error() -> Result<()> {
    let mut env = logged_in()?;
    env.server
        .mock("GET", "/organizations/404")
        .with_status(404)
        .with_body(r#"{"detail": "Organization not found"}"#)
        .create();

    let status = env.session().build()?.run_status(org(ResourceCommands::Get {
        id: "404".to_string(),
    }));

    assert_eq!(status, ExitStatus::Api);
    Ok(())
}

#[test]
fn org_create_posts_json() -> Result<()> {
    let mut env = logged_in()?;
    let mock = env
        .server
        .mock("POST", "/organizations")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({ "name": "umbrella" })))
        .with_status(201)
        .with_body(item_body(resource(7, "umbrella", None)))
        .create();

    let session = env.session().build()?;
    session.run(org(ResourceCommands::Create {
        name: "umbrella".to_string(),
        description: None,
    }))?;

    mock.assert();
    assert!(session.output().contains("Created organization 'umbrella'"));
    Ok(())
}

#[test]
fn org_create_validation_error_names_fields() -> Result<()> {
    let mut env = logged_in()?;
    env.server
        .mock("POST", "/organizations")
        .with_status(422)
        .with_body(validation_body("name already taken", &["name"]))
        .create();

    let err = env
        .session()
        .build()?
        .run(org(ResourceCommands::Create {
            name: "acme".to_string(),
            description: None,
        }))
        .unwrap_err();

    assert_eq!(ExitStatus::from_error(&err), ExitStatus::Api);
    let message = format!("{err:#}");
    assert!(message.contains("name already taken"));
    assert!(message.contains("fields: name"));
    Ok(())
}

#[test]
fn org_update_and_delete() -> Result<()> {
    let mut env = logged_in()?;
    let update = env
        .server
        .mock("PUT", "/organizations/3")
        .match_body(Matcher::Json(json!({ "description": "new" })))
        .with_status(200)
        .with_body(item_body(resource(3, "acme", Some("new"))))
        .create();
    let delete = env
        .server
        .mock("DELETE", "/organizations/3")
        .with_status(204)
        .create();

    let session = env.session().build()?;
    session.run(org(ResourceCommands::Update {
        id: "3".to_string(),
        name: None,
        description: Some("new".to_string()),
    }))?;
    session.run(org(ResourceCommands::Delete {
        id: "3".to_string(),
    }))?;

    update.assert();
    delete.assert();
    assert!(session.output().contains("Deleted organization 3"));
    Ok(())
}

#[test]
fn server_error_is_api_error_and_not_retried() -> Result<()> {
    let mut env = logged_in()?;
    let mock = env
        .server
        .mock("GET", "/organizations?skip=0&limit=100")
        .with_status(500)
        .with_body(r#"{"message": "database unavailable"}"#)
        .expect(1)
        .create();

    let status = env.session().build()?.run_status(org(ResourceCommands::List));

    assert_eq!(status, ExitStatus::Api);
    mock.assert();
    Ok(())
}

#[test]
fn environments_are_scoped_by_organization() -> Result<()> {
    let mut env = logged_in()?;
    let list = env
        .server
        .mock("GET", "/organizations/7/environments?skip=0&limit=100")
        .with_status(200)
        .with_body(r#"[{"id": "e1", "name": "staging"}, {"id": "e2", "name": "prod"}]"#)
        .create();
    let create = env
        .server
        .mock("POST", "/organizations/7/environments")
        .match_body(Matcher::Json(json!({ "name": "qa", "description": "scratch" })))
        .with_status(201)
        .with_body(r#"{"id": "e3", "name": "qa", "description": "scratch"}"#)
        .create();

    let session = env.session().build()?;
    session.run(environment("7", ResourceCommands::List))?;
    session.run(environment(
        "7",
        ResourceCommands::Create {
            name: "qa".to_string(),
            description: Some("scratch".to_string()),
        },
    ))?;

    list.assert();
    create.assert();
    let output = session.output();
    assert!(output.contains("Environments (2):"));
    assert!(output.contains("  e1: staging"));
    assert!(output.contains("Created environment 'qa'"));
    Ok(())
}

#[test]
fn environment_ids_are_path_escaped() -> Result<()> {
    let mut env = logged_in()?;
    let mock = env
        .server
        .mock("DELETE", "/organizations/a%2Fb/environments/e%201")
        .with_status(204)
        .create();

    env.session().build()?.run(environment(
        "a/b",
        ResourceCommands::Delete {
            id: "e 1".to_string(),
        },
    ))?;

    mock.assert();
    Ok(())
}
