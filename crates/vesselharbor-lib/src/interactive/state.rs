//! Menu state machine for interactive mode
//!
//! Input arrives as [`Event`]s and is queued. The controller turns at most
//! one event at a time into a [`RemoteCall`]; while that call is in flight no
//! further events are applied, so a quit typed during a slow request is
//! honored only after the request finishes or times out.
//!
//! Driving the machine is a three-step loop: [`InteractiveController::pump`]
//! hands out the next call, [`InteractiveController::perform`] runs it
//! through the resource catalog, [`InteractiveController::complete`] applies
//! its outcome. [`InteractiveController::dispatch`] runs the whole loop.

use crate::primitives::{ExitStatus, HarborError};
use crate::resources::{
    EDITABLE_FIELDS, FieldValues, Resource, ResourceCatalog, ResourceKind, missing_required,
};
use std::collections::VecDeque;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    MainMenu,
    ResourceTypeSelect,
    ListView,
    DetailView,
    EditForm,
    ConfirmDelete,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit,
}

/// Everything the screens render from
#[derive(Debug, Clone, PartialEq)]
pub struct MenuState {
    pub screen: Screen,
    pub selected_kind: Option<ResourceKind>,
    /// Parent organization for scoped kinds
    pub scope: Option<String>,
    /// Organizations offered as parents on the type-select screen
    pub scope_options: Vec<Resource>,
    pub selected_resource_id: Option<String>,
    pub selected_resource: Option<Resource>,
    pub cached_list: Vec<Resource>,
    pub form_mode: Option<FormMode>,
    pub dirty_fields: Option<FieldValues>,
    pub error: Option<String>,
    pub notice: Option<String>,
}

impl Default for MenuState {
    fn default() -> Self {
        Self {
            screen: Screen::MainMenu,
            selected_kind: None,
            scope: None,
            scope_options: Vec::new(),
            selected_resource_id: None,
            selected_resource: None,
            cached_list: Vec::new(),
            form_mode: None,
            dirty_fields: None,
            error: None,
            notice: None,
        }
    }
}

/// User input, already decoded from keys or menu choices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SelectKind(ResourceKind),
    ConfirmKind { scope: Option<String> },
    SelectItem(String),
    Create,
    Refresh,
    Edit,
    Delete,
    SetField { field: String, value: String },
    Submit,
    Cancel,
    Answer(bool),
    Back,
    Quit,
}

/// A remote operation requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    ListScopes,
    List {
        kind: ResourceKind,
        scope: Option<String>,
    },
    Get {
        kind: ResourceKind,
        scope: Option<String>,
        id: String,
    },
    Create {
        kind: ResourceKind,
        scope: Option<String>,
        fields: FieldValues,
    },
    Update {
        kind: ResourceKind,
        scope: Option<String>,
        id: String,
        fields: FieldValues,
    },
    Delete {
        kind: ResourceKind,
        scope: Option<String>,
        id: String,
    },
}

impl RemoteCall {
    /// Busy-indicator text
    pub fn describe(&self) -> String {
        match self {
            RemoteCall::ListScopes => "Loading organizations".to_string(),
            RemoteCall::List { kind, .. } => format!("Loading {}", kind.plural_title().to_lowercase()),
            RemoteCall::Get { kind, id, .. } => format!("Loading {kind} {id}"),
            RemoteCall::Create { kind, .. } => format!("Creating {kind}"),
            RemoteCall::Update { kind, id, .. } => format!("Updating {kind} {id}"),
            RemoteCall::Delete { kind, id, .. } => format!("Deleting {kind} {id}"),
        }
    }

    fn refetch(&self) -> Option<RemoteCall> {
        match self {
            RemoteCall::Create { kind, scope, .. }
            | RemoteCall::Update { kind, scope, .. }
            | RemoteCall::Delete { kind, scope, .. } => Some(RemoteCall::List {
                kind: *kind,
                scope: scope.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    Scopes(Vec<Resource>),
    Listed(Vec<Resource>),
    Fetched(Resource),
    Saved(Resource),
    Deleted,
}

/// Whether `event` means anything on `screen` (pure function)
pub fn accepts(screen: Screen, event: &Event) -> bool {
    use Event as E;
    use Screen as S;

    match (screen, event) {
        (S::Exit, _) => false,
        (_, E::Quit) => true,
        (S::MainMenu, E::SelectKind(_)) => true,
        (S::ResourceTypeSelect, E::ConfirmKind { .. } | E::Back) => true,
        (S::ListView, E::SelectItem(_) | E::Create | E::Refresh | E::Back) => true,
        (S::DetailView, E::Edit | E::Delete | E::Back) => true,
        (S::EditForm, E::SetField { .. } | E::Submit | E::Cancel) => true,
        (S::ConfirmDelete, E::Answer(_) | E::Cancel | E::Back) => true,
        _ => false,
    }
}

pub struct InteractiveController<'a> {
    catalog: &'a dyn ResourceCatalog,
    state: MenuState,
    in_flight: Option<RemoteCall>,
    follow_up: Option<RemoteCall>,
    pending: VecDeque<Event>,
    exit_status: ExitStatus,
    fatal: Option<HarborError>,
}

impl<'a> InteractiveController<'a> {
    pub fn new(catalog: &'a dyn ResourceCatalog) -> Self {
        Self {
            catalog,
            state: MenuState::default(),
            in_flight: None,
            follow_up: None,
            pending: VecDeque::new(),
            exit_status: ExitStatus::Success,
            fatal: None,
        }
    }

    pub fn state(&self) -> &MenuState {
        &self.state
    }

    /// A remote call has been handed out and not completed yet
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.state.screen == Screen::Exit
    }

    pub fn exit_status(&self) -> ExitStatus {
        self.exit_status
    }

    /// The error that forced the exit, if any
    pub fn take_fatal(&mut self) -> Option<HarborError> {
        self.fatal.take()
    }

    /// Queue an event; it is applied by the next `pump`
    pub fn submit(&mut self, event: Event) {
        if self.is_finished() {
            return;
        }
        self.pending.push_back(event);
    }

    /// Apply queued events until one needs a remote call, and hand that
    /// call out. Returns `None` while a call is in flight.
    pub fn pump(&mut self) -> Option<RemoteCall> {
        if self.in_flight.is_some() {
            return None;
        }
        if self.is_finished() {
            self.pending.clear();
            return None;
        }

        // A queued quit wins over the refetch and anything queued before it
        if self.pending.iter().any(|event| matches!(event, Event::Quit)) {
            self.pending.clear();
            self.apply(Event::Quit);
            return None;
        }

        if let Some(call) = self.follow_up.take() {
            self.in_flight = Some(call.clone());
            return Some(call);
        }

        while let Some(event) = self.pending.pop_front() {
            if let Some(call) = self.apply(event) {
                self.in_flight = Some(call.clone());
                return Some(call);
            }
            if self.is_finished() {
                self.pending.clear();
                break;
            }
        }
        None
    }

    /// Run one call against the catalog
    pub fn perform(&self, call: &RemoteCall) -> Result<CallResult, HarborError> {
        match call {
            RemoteCall::ListScopes => {
                let service = self.catalog.service(ResourceKind::Organization, None)?;
                Ok(CallResult::Scopes(service.list()?))
            }
            RemoteCall::List { kind, scope } => {
                let service = self.catalog.service(*kind, scope.as_deref())?;
                Ok(CallResult::Listed(service.list()?))
            }
            RemoteCall::Get { kind, scope, id } => {
                let service = self.catalog.service(*kind, scope.as_deref())?;
                Ok(CallResult::Fetched(service.get(id)?))
            }
            RemoteCall::Create {
                kind,
                scope,
                fields,
            } => {
                let service = self.catalog.service(*kind, scope.as_deref())?;
                Ok(CallResult::Saved(service.create(fields)?))
            }
            RemoteCall::Update {
                kind,
                scope,
                id,
                fields,
            } => {
                let service = self.catalog.service(*kind, scope.as_deref())?;
                Ok(CallResult::Saved(service.update(id, fields)?))
            }
            RemoteCall::Delete { kind, scope, id } => {
                let service = self.catalog.service(*kind, scope.as_deref())?;
                service.delete(id)?;
                Ok(CallResult::Deleted)
            }
        }
    }

    /// Apply the outcome of the in-flight call
    pub fn complete(&mut self, outcome: Result<CallResult, HarborError>) {
        let Some(call) = self.in_flight.take() else {
            warn!("completion without a call in flight");
            return;
        };

        match outcome {
            Ok(result) => self.on_result(call, result),
            Err(error) => self.on_error(call, error),
        }
    }

    /// Submit `event` and run every call it leads to
    pub fn dispatch(&mut self, event: Event) {
        self.submit(event);
        self.drain();
    }

    /// Run queued work until the controller is idle
    pub fn drain(&mut self) {
        while let Some(call) = self.pump() {
            let outcome = self.perform(&call);
            self.complete(outcome);
        }
    }

    fn apply(&mut self, event: Event) -> Option<RemoteCall> {
        let screen = self.state.screen;
        if !accepts(screen, &event) {
            debug!(?screen, ?event, "event ignored");
            return None;
        }

        self.state.error = None;
        if !matches!(event, Event::SetField { .. }) {
            self.state.notice = None;
        }

        match event {
            Event::Quit => {
                self.state.screen = Screen::Exit;
                self.follow_up = None;
                None
            }
            Event::SelectKind(kind) => {
                self.state.selected_kind = Some(kind);
                self.state.scope = None;
                self.state.scope_options.clear();
                self.state.screen = Screen::ResourceTypeSelect;
                kind.requires_scope().then_some(RemoteCall::ListScopes)
            }
            Event::ConfirmKind { scope } => self.confirm_kind(scope),
            Event::SelectItem(id) => {
                let (kind, scope) = self.target()?;
                Some(RemoteCall::Get { kind, scope, id })
            }
            Event::Create => {
                let mut fields = FieldValues::new();
                for field in EDITABLE_FIELDS {
                    fields.insert(field.to_string(), String::new());
                }
                self.state.form_mode = Some(FormMode::Create);
                self.state.dirty_fields = Some(fields);
                self.state.screen = Screen::EditForm;
                None
            }
            Event::Refresh => {
                let (kind, scope) = self.target()?;
                Some(RemoteCall::List { kind, scope })
            }
            Event::Edit => {
                let fields = self
                    .state
                    .selected_resource
                    .as_ref()
                    .map(Resource::field_values)
                    .unwrap_or_default();
                self.state.form_mode = Some(FormMode::Edit);
                self.state.dirty_fields = Some(fields);
                self.state.screen = Screen::EditForm;
                None
            }
            Event::Delete => {
                self.state.screen = Screen::ConfirmDelete;
                None
            }
            Event::SetField { field, value } => {
                if EDITABLE_FIELDS.contains(&field.as_str()) {
                    self.state
                        .dirty_fields
                        .get_or_insert_with(FieldValues::new)
                        .insert(field, value);
                } else {
                    self.state.error = Some(format!("'{field}' cannot be edited"));
                }
                None
            }
            Event::Submit => self.submit_form(),
            Event::Cancel if screen == Screen::EditForm => {
                self.state.dirty_fields = None;
                self.state.screen = match self.state.form_mode.take() {
                    Some(FormMode::Edit) => Screen::DetailView,
                    _ => Screen::ListView,
                };
                None
            }
            Event::Answer(true) if screen == Screen::ConfirmDelete => {
                let (kind, scope) = self.target()?;
                let id = self.state.selected_resource_id.clone()?;
                Some(RemoteCall::Delete { kind, scope, id })
            }
            Event::Answer(_) | Event::Cancel | Event::Back if screen == Screen::ConfirmDelete => {
                self.state.screen = Screen::DetailView;
                None
            }
            Event::Back => {
                self.go_back(screen);
                None
            }
            Event::Answer(_) | Event::Cancel => None,
        }
    }

    fn confirm_kind(&mut self, scope: Option<String>) -> Option<RemoteCall> {
        let kind = self.state.selected_kind?;
        let scope = scope.filter(|scope| !scope.trim().is_empty());

        if kind.requires_scope() && scope.is_none() {
            self.state.error = Some(format!(
                "Select an organization to browse {}",
                kind.plural_title().to_lowercase()
            ));
            return None;
        }

        self.state.scope = if kind.requires_scope() { scope } else { None };
        Some(RemoteCall::List {
            kind,
            scope: self.state.scope.clone(),
        })
    }

    fn submit_form(&mut self) -> Option<RemoteCall> {
        let fields = self.state.dirty_fields.clone().unwrap_or_default();
        let missing = missing_required(&fields);
        if !missing.is_empty() {
            self.state.error = Some(format!("Required: {}", missing.join(", ")));
            return None;
        }

        let (kind, scope) = self.target()?;
        match self.state.form_mode {
            Some(FormMode::Edit) => {
                let id = self.state.selected_resource_id.clone()?;
                Some(RemoteCall::Update {
                    kind,
                    scope,
                    id,
                    fields,
                })
            }
            _ => Some(RemoteCall::Create {
                kind,
                scope,
                fields,
            }),
        }
    }

    fn go_back(&mut self, screen: Screen) {
        match screen {
            Screen::ResourceTypeSelect | Screen::ListView => {
                self.state.selected_kind = None;
                self.state.scope = None;
                self.state.scope_options.clear();
                self.state.cached_list.clear();
                self.clear_selection();
                self.state.screen = Screen::MainMenu;
            }
            Screen::DetailView => {
                self.clear_selection();
                self.state.screen = Screen::ListView;
            }
            _ => {}
        }
    }

    fn clear_selection(&mut self) {
        self.state.selected_resource_id = None;
        self.state.selected_resource = None;
        self.state.form_mode = None;
        self.state.dirty_fields = None;
    }

    fn target(&self) -> Option<(ResourceKind, Option<String>)> {
        self.state
            .selected_kind
            .map(|kind| (kind, self.state.scope.clone()))
    }

    fn on_result(&mut self, call: RemoteCall, result: CallResult) {
        if self.is_finished() {
            return;
        }

        match result {
            CallResult::Scopes(organizations) => {
                self.state.scope_options = organizations;
            }
            CallResult::Listed(items) => {
                debug!(count = items.len(), "list refreshed");
                self.state.cached_list = items;
                self.clear_selection();
                self.state.screen = Screen::ListView;
            }
            CallResult::Fetched(resource) => {
                self.state.selected_resource_id = Some(resource.id.clone());
                self.state.selected_resource = Some(resource);
                self.state.screen = Screen::DetailView;
            }
            CallResult::Saved(resource) => {
                let verb = match call {
                    RemoteCall::Update { .. } => "Updated",
                    _ => "Created",
                };
                self.state.notice = Some(format!("{verb} {} '{}'", resource.kind, resource.name));
                self.state.dirty_fields = None;
                self.follow_up = call.refetch();
            }
            CallResult::Deleted => {
                if let RemoteCall::Delete { kind, id, .. } = &call {
                    self.state.notice = Some(format!("Deleted {kind} {id}"));
                }
                self.follow_up = call.refetch();
            }
        }
    }

    fn on_error(&mut self, call: RemoteCall, error: HarborError) {
        if error.is_fatal() {
            warn!(%error, "ending interactive session");
            self.exit_status = error.exit_status();
            self.fatal = Some(error);
            self.state.screen = Screen::Exit;
            self.follow_up = None;
            self.pending.clear();
            return;
        }

        self.state.error = Some(error.to_string());
        match call {
            // Mutations that fail stay on the form with the user's input
            RemoteCall::Create { .. } | RemoteCall::Update { .. } => {
                self.state.screen = Screen::EditForm;
            }
            RemoteCall::Delete { .. } => {
                self.state.screen = Screen::DetailView;
            }
            RemoteCall::List { .. } if self.state.screen != Screen::ResourceTypeSelect => {
                self.clear_selection();
                self.state.screen = Screen::ListView;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    include!("state.test.rs");
}
