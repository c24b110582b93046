use super::*;
use crate::application::session_mocks::InMemoryCatalog;
use crate::primitives::{ApiError, AuthError, ConfigError, NetworkError};

fn orgs() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_resource(ResourceKind::Organization, None, "1", "acme")
        .with_resource(ResourceKind::Organization, None, "2", "globex")
        .with_resource(ResourceKind::Organization, None, "3", "initech")
}

fn at_list(controller: &mut InteractiveController<'_>) {
    controller.dispatch(Event::SelectKind(ResourceKind::Organization));
    controller.dispatch(Event::ConfirmKind { scope: None });
    assert_eq!(controller.state().screen, Screen::ListView);
}

fn at_detail(controller: &mut InteractiveController<'_>, id: &str) {
    at_list(controller);
    controller.dispatch(Event::SelectItem(id.to_string()));
    assert_eq!(controller.state().screen, Screen::DetailView);
}

#[test]
fn test_starts_on_main_menu() {
    let catalog = orgs();
    let controller = InteractiveController::new(&catalog);
    assert_eq!(controller.state().screen, Screen::MainMenu);
    assert!(!controller.is_busy());
    assert!(!controller.is_finished());
}

#[test]
fn test_browse_to_detail() {
    let catalog = orgs();
    let mut controller = InteractiveController::new(&catalog);

    controller.dispatch(Event::SelectKind(ResourceKind::Organization));
    assert_eq!(controller.state().screen, Screen::ResourceTypeSelect);
    assert!(catalog.calls().is_empty());

    controller.dispatch(Event::ConfirmKind { scope: None });
    assert_eq!(controller.state().screen, Screen::ListView);
    assert_eq!(controller.state().cached_list.len(), 3);

    controller.dispatch(Event::SelectItem("2".to_string()));
    let state = controller.state();
    assert_eq!(state.screen, Screen::DetailView);
    assert_eq!(state.selected_resource_id.as_deref(), Some("2"));
    assert_eq!(state.selected_resource.as_ref().unwrap().name, "globex");
}

#[test]
fn test_environments_need_an_organization() {
    let catalog = orgs().with_resource(ResourceKind::Environment, Some("1"), "e1", "staging");
    let mut controller = InteractiveController::new(&catalog);

    controller.dispatch(Event::SelectKind(ResourceKind::Environment));
    assert_eq!(controller.state().scope_options.len(), 3);
    assert_eq!(catalog.calls(), vec!["list organization".to_string()]);

    controller.dispatch(Event::ConfirmKind { scope: None });
    assert_eq!(controller.state().screen, Screen::ResourceTypeSelect);
    assert!(controller.state().error.is_some());

    controller.dispatch(Event::ConfirmKind {
        scope: Some("1".to_string()),
    });
    let state = controller.state();
    assert_eq!(state.screen, Screen::ListView);
    assert_eq!(state.scope.as_deref(), Some("1"));
    assert_eq!(state.cached_list[0].name, "staging");
    assert!(state.error.is_none());
}

#[test]
fn test_create_with_empty_name_stays_in_form() {
    let catalog = orgs();
    let mut controller = InteractiveController::new(&catalog);
    at_list(&mut controller);

    controller.dispatch(Event::Create);
    assert_eq!(controller.state().screen, Screen::EditForm);

    controller.dispatch(Event::SetField {
        field: "description".to_string(),
        value: "no name yet".to_string(),
    });
    controller.dispatch(Event::Submit);

    let state = controller.state();
    assert_eq!(state.screen, Screen::EditForm);
    assert!(state.error.as_deref().unwrap().contains("name"));
    assert_eq!(
        state.dirty_fields.as_ref().unwrap().get("description").map(String::as_str),
        Some("no name yet")
    );
    assert!(!catalog.calls().iter().any(|call| call.starts_with("create")));
}

#[test]
fn test_create_refetches_list() {
    let catalog = orgs();
    let mut controller = InteractiveController::new(&catalog);
    at_list(&mut controller);

    controller.dispatch(Event::Create);
    controller.dispatch(Event::SetField {
        field: "name".to_string(),
        value: "umbrella".to_string(),
    });
    controller.dispatch(Event::Submit);

    let state = controller.state();
    assert_eq!(state.screen, Screen::ListView);
    assert_eq!(state.cached_list.len(), 4);
    assert!(state.dirty_fields.is_none());
    assert!(state.notice.as_deref().unwrap().contains("umbrella"));
    assert_eq!(
        catalog.calls()[catalog.calls().len() - 2..],
        ["create organization".to_string(), "list organization".to_string()]
    );
}

#[test]
fn test_server_validation_error_keeps_dirty_fields() {
    let catalog = orgs();
    let mut controller = InteractiveController::new(&catalog);
    at_detail(&mut controller, "1");

    controller.dispatch(Event::Edit);
    assert_eq!(
        controller.state().dirty_fields.as_ref().unwrap().get("name").map(String::as_str),
        Some("acme")
    );

    controller.dispatch(Event::SetField {
        field: "name".to_string(),
        value: "globex".to_string(),
    });
    catalog.fail_next(
        "update",
        ApiError::Validation {
            message: "name already taken".to_string(),
            fields: vec!["name".to_string()],
        }
        .into(),
    );
    controller.dispatch(Event::Submit);

    let state = controller.state();
    assert_eq!(state.screen, Screen::EditForm);
    assert!(state.error.as_deref().unwrap().contains("name already taken"));
    assert_eq!(
        state.dirty_fields.as_ref().unwrap().get("name").map(String::as_str),
        Some("globex")
    );
    assert_eq!(controller.exit_status(), ExitStatus::Success);
}

#[test]
fn test_edit_cancel_returns_to_detail() {
    let catalog = orgs();
    let mut controller = InteractiveController::new(&catalog);
    at_detail(&mut controller, "1");

    controller.dispatch(Event::Edit);
    controller.dispatch(Event::Cancel);
    assert_eq!(controller.state().screen, Screen::DetailView);
    assert!(controller.state().dirty_fields.is_none());

    controller.dispatch(Event::Back);
    assert_eq!(controller.state().screen, Screen::ListView);
    controller.dispatch(Event::Create);
    controller.dispatch(Event::Cancel);
    assert_eq!(controller.state().screen, Screen::ListView);
}

#[test]
fn test_update_refetches_list() {
    let catalog = orgs();
    let mut controller = InteractiveController::new(&catalog);
    at_detail(&mut controller, "3");

    controller.dispatch(Event::Edit);
    controller.dispatch(Event::SetField {
        field: "name".to_string(),
        value: "initrode".to_string(),
    });
    controller.dispatch(Event::Submit);

    let state = controller.state();
    assert_eq!(state.screen, Screen::ListView);
    assert!(state.cached_list.iter().any(|item| item.name == "initrode"));
    assert!(catalog.calls().contains(&"update organization 3".to_string()));
}

#[test]
fn test_confirm_delete_refetches_instead_of_patching() {
    let catalog = orgs();
    let mut controller = InteractiveController::new(&catalog);
    at_detail(&mut controller, "2");
    assert_eq!(controller.state().cached_list.len(), 3);

    controller.dispatch(Event::Delete);
    assert_eq!(controller.state().screen, Screen::ConfirmDelete);

    controller.dispatch(Event::Answer(true));
    let state = controller.state();
    assert_eq!(state.screen, Screen::ListView);
    assert_eq!(state.cached_list.len(), 2);
    assert!(state.cached_list.iter().all(|item| item.id != "2"));
    assert_eq!(
        catalog.calls().last().map(String::as_str),
        Some("list organization")
    );
}

#[test]
fn test_list_length_comes_from_server_after_delete() {
    let catalog = orgs();
    let mut controller = InteractiveController::new(&catalog);
    at_detail(&mut controller, "2");

    // Another client removed an item meanwhile; the refetch reports it
    catalog
        .service(ResourceKind::Organization, None)
        .unwrap()
        .delete("3")
        .unwrap();

    controller.dispatch(Event::Delete);
    controller.dispatch(Event::Answer(true));
    assert_eq!(controller.state().cached_list.len(), 1);
}

#[test]
fn test_declined_delete_returns_to_detail() {
    let catalog = orgs();
    let mut controller = InteractiveController::new(&catalog);
    at_detail(&mut controller, "1");

    controller.dispatch(Event::Delete);
    controller.dispatch(Event::Answer(false));
    assert_eq!(controller.state().screen, Screen::DetailView);
    assert_eq!(catalog.resources(ResourceKind::Organization, None).len(), 3);
}

#[test]
fn test_quit_from_any_screen() {
    let catalog = orgs();
    let mut controller = InteractiveController::new(&catalog);
    at_detail(&mut controller, "1");
    controller.dispatch(Event::Edit);

    controller.dispatch(Event::Quit);
    assert!(controller.is_finished());
    assert_eq!(controller.exit_status(), ExitStatus::Success);

    controller.dispatch(Event::Back);
    assert_eq!(controller.state().screen, Screen::Exit);
}

#[test]
fn test_auth_error_forces_exit_with_status() {
    let catalog = orgs();
    let mut controller = InteractiveController::new(&catalog);
    controller.dispatch(Event::SelectKind(ResourceKind::Organization));

    catalog.fail_next(
        "list",
        AuthError::NeedsLogin {
            reason: "the refresh token was rejected".to_string(),
        }
        .into(),
    );
    controller.dispatch(Event::ConfirmKind { scope: None });

    assert!(controller.is_finished());
    assert_eq!(controller.exit_status(), ExitStatus::Auth);
    assert!(matches!(
        controller.take_fatal(),
        Some(HarborError::Auth(AuthError::NeedsLogin { .. }))
    ));
}

#[test]
fn test_config_error_forces_exit() {
    let catalog = orgs();
    let mut controller = InteractiveController::new(&catalog);
    at_list(&mut controller);

    catalog.fail_next("get", ConfigError::MissingCredentials.into());
    controller.dispatch(Event::SelectItem("1".to_string()));
    assert_eq!(controller.exit_status(), ExitStatus::Config);
    assert!(controller.is_finished());
}

#[test]
fn test_network_error_is_shown_inline() {
    let catalog = orgs();
    let mut controller = InteractiveController::new(&catalog);
    at_list(&mut controller);

    catalog.fail_next(
        "list",
        NetworkError::Timeout {
            url: "http://h/organizations".to_string(),
        }
        .into(),
    );
    controller.dispatch(Event::Refresh);

    let state = controller.state();
    assert_eq!(state.screen, Screen::ListView);
    assert!(state.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(state.cached_list.len(), 3);
    assert!(!controller.is_finished());
}

#[test]
fn test_missing_item_stays_on_list() {
    let catalog = orgs();
    let mut controller = InteractiveController::new(&catalog);
    at_list(&mut controller);

    controller.dispatch(Event::SelectItem("404".to_string()));
    assert_eq!(controller.state().screen, Screen::ListView);
    assert!(controller.state().error.as_deref().unwrap().contains("not found"));
}

#[test]
fn test_events_queue_while_call_in_flight() {
    let catalog = orgs();
    let mut controller = InteractiveController::new(&catalog);
    controller.dispatch(Event::SelectKind(ResourceKind::Organization));

    controller.submit(Event::ConfirmKind { scope: None });
    let call = controller.pump().unwrap();
    assert!(controller.is_busy());

    controller.submit(Event::Quit);
    assert_eq!(controller.pump(), None);
    assert_eq!(controller.state().screen, Screen::ResourceTypeSelect);

    let outcome = controller.perform(&call);
    controller.complete(outcome);
    assert_eq!(controller.state().screen, Screen::ListView);

    assert_eq!(controller.pump(), None);
    assert!(controller.is_finished());
}

#[test]
fn test_quit_during_create_skips_the_refetch() {
    let catalog = orgs();
    let mut controller = InteractiveController::new(&catalog);
    at_list(&mut controller);
    controller.dispatch(Event::Create);
    controller.dispatch(Event::SetField {
        field: "name".to_string(),
        value: "umbrella".to_string(),
    });

    controller.submit(Event::Submit);
    let call = controller.pump().unwrap();
    controller.submit(Event::Quit);
    let outcome = controller.perform(&call);
    controller.complete(outcome);

    let before = catalog.calls().len();
    controller.drain();

    assert!(controller.is_finished());
    assert_eq!(catalog.calls().len(), before);
    assert_eq!(catalog.calls().last().map(String::as_str), Some("create organization"));
}

#[test]
fn test_unknown_field_is_rejected() {
    let catalog = orgs();
    let mut controller = InteractiveController::new(&catalog);
    at_list(&mut controller);
    controller.dispatch(Event::Create);

    controller.dispatch(Event::SetField {
        field: "id".to_string(),
        value: "9".to_string(),
    });
    assert!(controller.state().error.is_some());
    assert!(!controller.state().dirty_fields.as_ref().unwrap().contains_key("id"));
}

#[test]
fn test_transition_table() {
    assert!(accepts(Screen::MainMenu, &Event::SelectKind(ResourceKind::Organization)));
    assert!(!accepts(Screen::MainMenu, &Event::Submit));
    assert!(accepts(Screen::EditForm, &Event::Quit));
    assert!(!accepts(Screen::Exit, &Event::Quit));
    assert!(!accepts(Screen::ListView, &Event::Edit));
    assert!(accepts(Screen::ConfirmDelete, &Event::Answer(true)));
}

#[test]
fn test_back_from_list_clears_selection() {
    let catalog = orgs();
    let mut controller = InteractiveController::new(&catalog);
    at_list(&mut controller);

    controller.dispatch(Event::Back);
    let state = controller.state();
    assert_eq!(state.screen, Screen::MainMenu);
    assert!(state.selected_kind.is_none());
    assert!(state.cached_list.is_empty());
}
