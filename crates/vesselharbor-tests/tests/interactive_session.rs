//! Interactive mode driven by scripted prompts against a local API server

use anyhow::Result;
use vesselharbor_lib::application::cli::Commands;
use vesselharbor_lib::application::session_mocks::MockInteractiveProvider;
use vesselharbor_lib::primitives::ExitStatus;
use vesselharbor_tests::TestEnvironment;
use vesselharbor_tests::fixtures::{item_body, list_body, password_session, resource};

fn logged_in() -> Result<TestEnvironment> {
    let env = TestEnvironment::new()?;
    env.store_session(&password_session(&env.api_url(), "access-1", Some("refresh-1"), 3600))?;
    Ok(env)
}

#[test]
fn browse_and_delete_refetches_the_list() -> Result<()> {
    let mut env = logged_in()?;
    let before = env
        .server
        .mock("GET", "/organizations?skip=0&limit=100")
        .with_status(200)
        .with_body(list_body(&[resource(1, "acme", None), resource(2, "globex", None)]))
        .expect(1)
        .create();
    let detail = env
        .server
        .mock("GET", "/organizations/2")
        .with_status(200)
        .with_body(item_body(resource(2, "globex", None)))
        .create();
    let delete = env
        .server
        .mock("DELETE", "/organizations/2")
        .with_status(204)
        .create();

    let after = env
        .server
        .mock("GET", "/organizations?skip=0&limit=100")
        .with_status(200)
        .with_body(list_body(&[resource(1, "acme", None)]))
        .expect(1)
        .create();

    // Organizations, Browse, pick globex, Delete, confirm, Quit from a list of one
    let prompts = MockInteractiveProvider::new()
        .with_selects(&[0, 0, 1, 1])
        .with_confirm(true)
        .with_select(4);
    let session = env.session().with_interactive(prompts).build()?;

    session.run(Commands::Interactive)?;

    before.assert();
    detail.assert();
    delete.assert();
    after.assert();
    let output = session.output();
    assert!(output.contains("Organizations (2):"));
    assert!(output.contains("Deleted organization 2"));
    assert!(output.contains("Organizations (1):"));
    Ok(())
}

#[test]
fn lost_session_ends_interactive_mode() -> Result<()> {
    let mut env = logged_in()?;
    env.server
        .mock("GET", "/organizations?skip=0&limit=100")
        .with_status(401)
        .create();
    env.server
        .mock("POST", "/refresh-token")
        .with_status(401)
        .create();

    let prompts = MockInteractiveProvider::new().with_selects(&[0, 0]);
    let status = env
        .session()
        .with_interactive(prompts)
        .build()?
        .run_status(Commands::Interactive);

    assert_eq!(status, ExitStatus::Auth);
    assert!(env.stored_session()?.is_none());
    Ok(())
}

#[test]
fn server_error_is_shown_inline() -> Result<()> {
    let mut env = logged_in()?;
    env.server
        .mock("GET", "/organizations?skip=0&limit=100")
        .with_status(503)
        .with_body(r#"{"message": "maintenance"}"#)
        .create();

    // Organizations, Browse (fails inline), Back, Quit
    let prompts = MockInteractiveProvider::new().with_selects(&[0, 0, 1, 2]);
    let session = env.session().with_interactive(prompts).build()?;
    session.run(Commands::Interactive)?;

    assert!(session.output().contains("maintenance"));
    Ok(())
}
