//! Terminal front end for the menu state machine
//!
//! Renders the current screen through the display provider, turns prompt
//! answers into events, and runs remote calls behind a busy indicator.

use crate::application::session::InteractiveProvider;
use crate::display::DisplayProvider;
use crate::primitives::ExitStatus;
use crate::resources::{EDITABLE_FIELDS, ResourceCatalog, ResourceKind};
use anyhow::Result;

use super::state::{Event, FormMode, InteractiveController, MenuState, Screen};

pub struct TerminalDriver<'a> {
    controller: InteractiveController<'a>,
    prompts: &'a dyn InteractiveProvider,
    display: &'a dyn DisplayProvider,
}

impl<'a> TerminalDriver<'a> {
    pub fn new(
        catalog: &'a dyn ResourceCatalog,
        prompts: &'a dyn InteractiveProvider,
        display: &'a dyn DisplayProvider,
    ) -> Self {
        Self {
            controller: InteractiveController::new(catalog),
            prompts,
            display,
        }
    }

    /// Run until the user quits or a fatal error ends the session
    pub fn run(mut self) -> Result<ExitStatus> {
        loop {
            self.flush();
            if self.controller.is_finished() {
                break;
            }

            self.render();
            for event in self.read_events()? {
                self.controller.submit(event);
            }
        }

        if let Some(fatal) = self.controller.take_fatal() {
            return Err(fatal.into());
        }
        Ok(self.controller.exit_status())
    }

    fn flush(&mut self) {
        while let Some(call) = self.controller.pump() {
            let busy = self.display.busy(&call.describe());
            let outcome = self.controller.perform(&call);
            busy.finish();
            self.controller.complete(outcome);
        }
    }

    fn render(&self) {
        let state = self.controller.state();
        if let Some(notice) = &state.notice {
            self.display.success(notice);
        }
        if let Some(error) = &state.error {
            self.display.error(error);
        }

        match state.screen {
            Screen::ListView => {
                let kind = state.selected_kind.unwrap_or(ResourceKind::Organization);
                self.display.section(&format!(
                    "{} ({}):",
                    kind.plural_title(),
                    state.cached_list.len()
                ));
                if state.cached_list.is_empty() {
                    self.display.subtle(&format!("  no {}s", kind.singular()));
                }
            }
            Screen::DetailView => {
                if let Some(resource) = &state.selected_resource {
                    self.display.properties(&[
                        ("ID", resource.id.as_str()),
                        ("Name", resource.name.as_str()),
                        ("Description", resource.description.as_deref().unwrap_or("")),
                    ]);
                }
            }
            _ => {}
        }
    }

    fn read_events(&self) -> Result<Vec<Event>> {
        let state = self.controller.state();
        let events = match state.screen {
            Screen::MainMenu => vec![self.main_menu()?],
            Screen::ResourceTypeSelect => vec![self.type_select(state)?],
            Screen::ListView => vec![self.list_view(state)?],
            Screen::DetailView => vec![self.detail_view()?],
            Screen::EditForm => self.edit_form(state)?,
            Screen::ConfirmDelete => vec![self.confirm_delete(state)?],
            Screen::Exit => Vec::new(),
        };
        Ok(events)
    }

    fn main_menu(&self) -> Result<Event> {
        let choice = self
            .prompts
            .select("VesselHarbor", &["Organizations", "Environments", "Quit"])?;
        Ok(match choice {
            0 => Event::SelectKind(ResourceKind::Organization),
            1 => Event::SelectKind(ResourceKind::Environment),
            _ => Event::Quit,
        })
    }

    fn type_select(&self, state: &MenuState) -> Result<Event> {
        let kind = state.selected_kind.unwrap_or(ResourceKind::Organization);

        if !kind.requires_scope() {
            let browse = format!("Browse {}", kind.plural_title().to_lowercase());
            let choice = self
                .prompts
                .select(kind.plural_title(), &[browse.as_str(), "Back", "Quit"])?;
            return Ok(match choice {
                0 => Event::ConfirmKind { scope: None },
                1 => Event::Back,
                _ => Event::Quit,
            });
        }

        let labels: Vec<String> = state
            .scope_options
            .iter()
            .map(|org| format!("{}: {}", org.id, org.name))
            .collect();
        let mut options: Vec<&str> = labels.iter().map(String::as_str).collect();
        options.extend(["Back", "Quit"]);

        let choice = self.prompts.select("Organization", &options)?;
        Ok(match state.scope_options.get(choice) {
            Some(org) => Event::ConfirmKind {
                scope: Some(org.id.clone()),
            },
            None if choice == labels.len() => Event::Back,
            None => Event::Quit,
        })
    }

    fn list_view(&self, state: &MenuState) -> Result<Event> {
        let kind = state.selected_kind.unwrap_or(ResourceKind::Organization);
        let labels: Vec<String> = state
            .cached_list
            .iter()
            .map(|item| format!("{}: {}", item.id, item.name))
            .collect();
        let create = format!("Create {}", kind.singular());
        let mut options: Vec<&str> = labels.iter().map(String::as_str).collect();
        options.extend([create.as_str(), "Refresh", "Back", "Quit"]);

        let choice = self.prompts.select(kind.plural_title(), &options)?;
        if let Some(item) = state.cached_list.get(choice) {
            return Ok(Event::SelectItem(item.id.clone()));
        }
        Ok(match choice - labels.len() {
            0 => Event::Create,
            1 => Event::Refresh,
            2 => Event::Back,
            _ => Event::Quit,
        })
    }

    fn detail_view(&self) -> Result<Event> {
        let choice = self
            .prompts
            .select("Action", &["Edit", "Delete", "Back", "Quit"])?;
        Ok(match choice {
            0 => Event::Edit,
            1 => Event::Delete,
            2 => Event::Back,
            _ => Event::Quit,
        })
    }

    fn edit_form(&self, state: &MenuState) -> Result<Vec<Event>> {
        let title = match state.form_mode {
            Some(FormMode::Edit) => "Edit",
            _ => "New",
        };
        let kind = state.selected_kind.unwrap_or(ResourceKind::Organization);
        self.display.section(&format!("{title} {kind}"));

        let mut events = Vec::new();
        for field in EDITABLE_FIELDS {
            let current = state
                .dirty_fields
                .as_ref()
                .and_then(|fields| fields.get(*field))
                .cloned()
                .unwrap_or_default();
            let value = self.prompts.text_input(&field_label(field), current)?;
            events.push(Event::SetField {
                field: field.to_string(),
                value,
            });
        }

        let choice = self.prompts.select("Save changes?", &["Save", "Cancel", "Quit"])?;
        events.push(match choice {
            0 => Event::Submit,
            1 => Event::Cancel,
            _ => Event::Quit,
        });
        Ok(events)
    }

    fn confirm_delete(&self, state: &MenuState) -> Result<Event> {
        let target = state
            .selected_resource
            .as_ref()
            .map(|resource| format!("{} '{}'", resource.kind, resource.name))
            .unwrap_or_else(|| "this item".to_string());
        let answer = self.prompts.confirm(&format!("Delete {target}?"), false)?;
        Ok(Event::Answer(answer))
    }
}

fn field_label(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::session_mocks::{InMemoryCatalog, MockInteractiveProvider};
    use crate::display::{DisplayCall, MockDisplayProvider};
    use crate::primitives::AuthError;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with_resource(ResourceKind::Organization, None, "1", "acme")
            .with_resource(ResourceKind::Organization, None, "2", "globex")
    }

    #[test]
    fn test_quit_from_main_menu() {
        let catalog = catalog();
        let prompts = MockInteractiveProvider::new().with_select(2);
        let display = MockDisplayProvider::new();

        let status = TerminalDriver::new(&catalog, &prompts, &display).run().unwrap();
        assert_eq!(status, ExitStatus::Success);
        assert!(catalog.calls().is_empty());
    }

    #[test]
    fn test_browse_and_delete() {
        let catalog = catalog();
        // Organizations, Browse, item 2, Delete, (confirm yes), Quit
        let prompts = MockInteractiveProvider::new()
            .with_selects(&[0, 0, 1, 1])
            .with_confirm(true)
            .with_select(4);
        let display = MockDisplayProvider::new();

        let status = TerminalDriver::new(&catalog, &prompts, &display).run().unwrap();
        assert_eq!(status, ExitStatus::Success);
        assert_eq!(catalog.resources(ResourceKind::Organization, None).len(), 1);
        assert!(display.has_call(&DisplayCall::Section("Organizations (2):".to_string())));
        assert!(display.has_call(&DisplayCall::Section("Organizations (1):".to_string())));
        assert!(display.has_call(&DisplayCall::Success("Deleted organization 2".to_string())));
        assert!(display.has_call(&DisplayCall::BusyStarted("Deleting organization 2".to_string())));
    }

    #[test]
    fn test_create_through_form() {
        let catalog = catalog();
        // Organizations, Browse, Create, (name, description), Save, Quit from a list of three
        let prompts = MockInteractiveProvider::new()
            .with_selects(&[0, 0, 2])
            .with_text_input("umbrella")
            .with_text_input("")
            .with_selects(&[0, 6]);
        let display = MockDisplayProvider::new();

        TerminalDriver::new(&catalog, &prompts, &display).run().unwrap();
        let names: Vec<String> = catalog
            .resources(ResourceKind::Organization, None)
            .into_iter()
            .map(|org| org.name)
            .collect();
        assert!(names.contains(&"umbrella".to_string()));
        assert_eq!(prompts.get_text_input_calls()[0].0, "Name");
    }

    #[test]
    fn test_fatal_error_surfaces() {
        let catalog = catalog();
        catalog.fail_next(
            "list",
            AuthError::NeedsLogin {
                reason: "expired".to_string(),
            }
            .into(),
        );
        let prompts = MockInteractiveProvider::new().with_selects(&[0, 0]);
        let display = MockDisplayProvider::new();

        let err = TerminalDriver::new(&catalog, &prompts, &display)
            .run()
            .unwrap_err();
        assert_eq!(ExitStatus::from_error(&err), ExitStatus::Auth);
    }

    #[test]
    fn test_field_label() {
        assert_eq!(field_label("description"), "Description");
        assert_eq!(field_label(""), "");
    }
}
