//! Mock implementations of session providers for testing
//!
//! These let command handlers, the session manager and the interactive
//! controller run without a terminal, a server or the user's home directory.

use crate::application::config::Settings;
use crate::application::loader::{ConfigPaths, LoadedConfig};
use crate::application::session::{InteractiveProvider, Session};
use crate::auth::{Clock, CredentialStore, Credentials};
use crate::display::{DisplayProvider, MockDisplayProvider};
use crate::networking::{ApiRequest, ApiResponse, Method, Transport};
use crate::platform::PlatformError;
use crate::primitives::{ApiError, ConfigError, HarborError, NetworkError};
use crate::resources::{FieldValues, Resource, ResourceCatalog, ResourceKind, ResourceService};
use anyhow::{Result, anyhow};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Credential store held in memory
#[derive(Default)]
pub struct MemoryCredentialStore {
    credentials: Mutex<Option<Credentials>>,
    fail_writes: Cell<bool>,
    clears: Cell<usize>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(credentials: Credentials) -> Self {
        let store = Self::new();
        *store.credentials.lock().unwrap() = Some(credentials);
        store
    }

    /// Make every save and clear fail like an unwritable directory
    pub fn failing_writes(self) -> Self {
        self.fail_writes.set(true);
        self
    }

    pub fn current(&self) -> Option<Credentials> {
        self.credentials.lock().unwrap().clone()
    }

    pub fn clear_count(&self) -> usize {
        self.clears.get()
    }

    fn write_error(&self) -> Option<ConfigError> {
        self.fail_writes.get().then(|| {
            ConfigError::Storage {
                source: PlatformError::WriteFailed {
                    path: PathBuf::from("memory"),
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                },
            }
        })
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, ConfigError> {
        Ok(self.current())
    }

    fn save(&self, credentials: &Credentials) -> Result<(), ConfigError> {
        if let Some(error) = self.write_error() {
            return Err(error);
        }
        *self.credentials.lock().unwrap() = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), ConfigError> {
        self.clears.set(self.clears.get() + 1);
        if let Some(error) = self.write_error() {
            return Err(error);
        }
        *self.credentials.lock().unwrap() = None;
        Ok(())
    }
}

type Scripted = std::result::Result<ApiResponse, NetworkError>;

struct Route {
    method: Method,
    path: String,
    queued: VecDeque<Scripted>,
    sticky: Option<ApiResponse>,
}

/// Transport that answers from a script keyed by method and URL path
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: Method, path: &str, scripted: Scripted) {
        let mut routes = self.routes.lock().unwrap();
        match routes
            .iter_mut()
            .find(|route| route.method == method && route.path == path)
        {
            Some(route) => route.queued.push_back(scripted),
            None => routes.push(Route {
                method,
                path: path.to_string(),
                queued: VecDeque::from([scripted]),
                sticky: None,
            }),
        }
    }

    /// Answer the next matching request once
    pub fn respond(self, method: Method, path: &str, status: u16, body: &str) -> Self {
        self.respond_with(method, path, ApiResponse::new(status, body))
    }

    pub fn respond_with(self, method: Method, path: &str, response: ApiResponse) -> Self {
        self.push(method, path, Ok(response));
        self
    }

    /// Answer every matching request once the queue for the route is empty
    pub fn respond_always(self, method: Method, path: &str, status: u16, body: &str) -> Self {
        {
            let mut routes = self.routes.lock().unwrap();
            let response = ApiResponse::new(status, body);
            match routes
                .iter_mut()
                .find(|route| route.method == method && route.path == path)
            {
                Some(route) => route.sticky = Some(response),
                None => routes.push(Route {
                    method,
                    path: path.to_string(),
                    queued: VecDeque::new(),
                    sticky: Some(response),
                }),
            }
        }
        self
    }

    /// Fail the next matching request at the network level
    pub fn fail(self, method: Method, path: &str, error: NetworkError) -> Self {
        self.push(method, path, Err(error));
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.method == method && url_path(&request.url) == path)
            .collect()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests_to(method, path).len()
    }
}

/// `http://h:9/a/b?x=1` -> `/a/b`
fn url_path(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = rest.find('/').map_or("/", |start| &rest[start..]);
    path.split('?').next().unwrap_or(path)
}

impl Transport for MockTransport {
    fn execute(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, NetworkError> {
        self.requests.lock().unwrap().push(request.clone());

        let path = url_path(&request.url);
        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .iter_mut()
            .find(|route| route.method == request.method && route.path == path);

        match route {
            Some(route) => match route.queued.pop_front() {
                Some(scripted) => scripted,
                None => route.sticky.clone().ok_or_else(|| unscripted(request)),
            },
            None => Err(unscripted(request)),
        }
    }
}

fn unscripted(request: &ApiRequest) -> NetworkError {
    NetworkError::Transport {
        url: request.url.clone(),
        reason: format!("no scripted response for {} {}", request.method, request.url),
    }
}

/// Clock pinned to a settable instant
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicU64,
}

impl FixedClock {
    pub fn at(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Scripted prompts; every call is recorded
#[derive(Clone)]
pub struct MockInteractiveProvider {
    interactive: bool,
    pub text_input_calls: Arc<Mutex<Vec<(String, String)>>>, // (prompt, default)
    pub password_calls: Arc<Mutex<Vec<String>>>,
    pub confirm_calls: Arc<Mutex<Vec<(String, bool)>>>,
    pub select_calls: Arc<Mutex<Vec<(String, Vec<String>)>>>, // (prompt, options)
    pub fuzzy_select_calls: Arc<Mutex<Vec<String>>>,
    text_inputs: Arc<Mutex<VecDeque<String>>>,
    passwords: Arc<Mutex<VecDeque<String>>>,
    confirms: Arc<Mutex<VecDeque<bool>>>,
    selects: Arc<Mutex<VecDeque<usize>>>,
    fuzzy_selects: Arc<Mutex<VecDeque<Option<usize>>>>,
}

impl Default for MockInteractiveProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInteractiveProvider {
    pub fn new() -> Self {
        Self {
            interactive: true,
            text_input_calls: Arc::default(),
            password_calls: Arc::default(),
            confirm_calls: Arc::default(),
            select_calls: Arc::default(),
            fuzzy_select_calls: Arc::default(),
            text_inputs: Arc::default(),
            passwords: Arc::default(),
            confirms: Arc::default(),
            selects: Arc::default(),
            fuzzy_selects: Arc::default(),
        }
    }

    /// Behave like a pipe: no prompts can be answered
    pub fn non_interactive(mut self) -> Self {
        self.interactive = false;
        self
    }

    pub fn with_text_input(self, response: &str) -> Self {
        self.text_inputs.lock().unwrap().push_back(response.to_string());
        self
    }

    pub fn with_password(self, response: &str) -> Self {
        self.passwords.lock().unwrap().push_back(response.to_string());
        self
    }

    pub fn with_confirm(self, response: bool) -> Self {
        self.confirms.lock().unwrap().push_back(response);
        self
    }

    pub fn with_select(self, response: usize) -> Self {
        self.selects.lock().unwrap().push_back(response);
        self
    }

    pub fn with_selects(self, responses: &[usize]) -> Self {
        self.selects.lock().unwrap().extend(responses);
        self
    }

    pub fn with_fuzzy_select(self, response: Option<usize>) -> Self {
        self.fuzzy_selects.lock().unwrap().push_back(response);
        self
    }

    pub fn get_text_input_calls(&self) -> Vec<(String, String)> {
        self.text_input_calls.lock().unwrap().clone()
    }

    pub fn get_password_calls(&self) -> Vec<String> {
        self.password_calls.lock().unwrap().clone()
    }

    pub fn get_confirm_calls(&self) -> Vec<(String, bool)> {
        self.confirm_calls.lock().unwrap().clone()
    }

    pub fn get_select_calls(&self) -> Vec<(String, Vec<String>)> {
        self.select_calls.lock().unwrap().clone()
    }

    fn require_terminal(&self) -> Result<()> {
        if self.interactive {
            Ok(())
        } else {
            Err(ConfigError::NotATerminal.into())
        }
    }
}

impl InteractiveProvider for MockInteractiveProvider {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn text_input(&self, prompt: &str, default: String) -> Result<String> {
        self.require_terminal()?;
        self.text_input_calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), default.clone()));
        Ok(self.text_inputs.lock().unwrap().pop_front().unwrap_or(default))
    }

    fn password(&self, prompt: &str) -> Result<String> {
        self.require_terminal()?;
        self.password_calls.lock().unwrap().push(prompt.to_string());
        self.passwords
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted password for '{prompt}'"))
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        self.confirm_calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), default));
        Ok(self.confirms.lock().unwrap().pop_front().unwrap_or(default))
    }

    fn select(&self, prompt: &str, options: &[&str]) -> Result<usize> {
        self.require_terminal()?;
        self.select_calls.lock().unwrap().push((
            prompt.to_string(),
            options.iter().map(|option| option.to_string()).collect(),
        ));
        self.selects
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted selection for '{prompt}'"))
    }

    fn fuzzy_select(&self, prompt: &str, _options: &[String]) -> Result<Option<usize>> {
        self.require_terminal()?;
        self.fuzzy_select_calls
            .lock()
            .unwrap()
            .push(prompt.to_string());
        self.fuzzy_selects
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted selection for '{prompt}'"))
    }
}

type Bucket = (ResourceKind, Option<String>);

/// Resource catalog held in memory, with one-shot failure injection
#[derive(Default)]
pub struct InMemoryCatalog {
    resources: RefCell<BTreeMap<Bucket, Vec<Resource>>>,
    next_id: Cell<u64>,
    calls: RefCell<Vec<String>>,
    failures: RefCell<Vec<(String, HarborError)>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(self, kind: ResourceKind, scope: Option<&str>, id: &str, name: &str) -> Self {
        self.resources
            .borrow_mut()
            .entry((kind, scope.map(str::to_string)))
            .or_default()
            .push(Resource {
                id: id.to_string(),
                name: name.to_string(),
                description: None,
                kind,
                etag: None,
            });
        self
    }

    /// Fail the next call of `operation` (`list`, `get`, `create`, `update`
    /// or `delete`) with `error`
    pub fn fail_next(&self, operation: &str, error: HarborError) {
        self.failures
            .borrow_mut()
            .push((operation.to_string(), error));
    }

    pub fn resources(&self, kind: ResourceKind, scope: Option<&str>) -> Vec<Resource> {
        self.resources
            .borrow()
            .get(&(kind, scope.map(str::to_string)))
            .cloned()
            .unwrap_or_default()
    }

    /// `"list organization"`, `"get environment 3"`, ...
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, entry: String) {
        self.calls.borrow_mut().push(entry);
    }

    fn injected(&self, operation: &str) -> Option<HarborError> {
        let mut failures = self.failures.borrow_mut();
        let index = failures.iter().position(|(op, _)| op == operation)?;
        Some(failures.remove(index).1)
    }
}

impl ResourceCatalog for InMemoryCatalog {
    fn service<'s>(
        &'s self,
        kind: ResourceKind,
        scope: Option<&str>,
    ) -> std::result::Result<Box<dyn ResourceService + 's>, HarborError> {
        if kind.requires_scope() && scope.is_none_or(|scope| scope.trim().is_empty()) {
            return Err(ApiError::Validation {
                message: "environments require an organization".to_string(),
                fields: vec!["org".to_string()],
            }
            .into());
        }
        Ok(Box::new(InMemoryService {
            catalog: self,
            kind,
            scope: scope.map(str::to_string),
        }))
    }
}

struct InMemoryService<'a> {
    catalog: &'a InMemoryCatalog,
    kind: ResourceKind,
    scope: Option<String>,
}

impl InMemoryService<'_> {
    fn bucket(&self) -> Bucket {
        (self.kind, self.scope.clone())
    }

    fn begin(&self, operation: &str, id: Option<&str>) -> std::result::Result<(), HarborError> {
        let entry = match id {
            Some(id) => format!("{operation} {} {id}", self.kind),
            None => format!("{operation} {}", self.kind),
        };
        self.catalog.record(entry);
        match self.catalog.injected(operation) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn not_found(&self, id: &str) -> HarborError {
        ApiError::NotFound {
            message: format!("{} {id} not found", self.kind),
        }
        .into()
    }
}

impl ResourceService for InMemoryService<'_> {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn list(&self) -> std::result::Result<Vec<Resource>, HarborError> {
        self.begin("list", None)?;
        Ok(self
            .catalog
            .resources(self.kind, self.scope.as_deref()))
    }

    fn get(&self, id: &str) -> std::result::Result<Resource, HarborError> {
        self.begin("get", Some(id))?;
        self.catalog
            .resources(self.kind, self.scope.as_deref())
            .into_iter()
            .find(|resource| resource.id == id)
            .ok_or_else(|| self.not_found(id))
    }

    fn create(&self, fields: &FieldValues) -> std::result::Result<Resource, HarborError> {
        self.begin("create", None)?;
        let next = self.catalog.next_id.get() + 100;
        self.catalog.next_id.set(self.catalog.next_id.get() + 1);

        let resource = Resource {
            id: next.to_string(),
            name: fields.get("name").cloned().unwrap_or_default(),
            description: fields
                .get("description")
                .filter(|value| !value.is_empty())
                .cloned(),
            kind: self.kind,
            etag: None,
        };
        self.catalog
            .resources
            .borrow_mut()
            .entry(self.bucket())
            .or_default()
            .push(resource.clone());
        Ok(resource)
    }

    fn update(&self, id: &str, fields: &FieldValues) -> std::result::Result<Resource, HarborError> {
        self.begin("update", Some(id))?;
        let mut resources = self.catalog.resources.borrow_mut();
        let resource = resources
            .get_mut(&self.bucket())
            .and_then(|items| items.iter_mut().find(|resource| resource.id == id))
            .ok_or_else(|| self.not_found(id))?;

        if let Some(name) = fields.get("name") {
            resource.name = name.clone();
        }
        if let Some(description) = fields.get("description") {
            resource.description = (!description.is_empty()).then(|| description.clone());
        }
        Ok(resource.clone())
    }

    fn delete(&self, id: &str) -> std::result::Result<(), HarborError> {
        self.begin("delete", Some(id))?;
        let mut resources = self.catalog.resources.borrow_mut();
        let items = resources.entry(self.bucket()).or_default();
        let before = items.len();
        items.retain(|resource| resource.id != id);
        if items.len() == before {
            return Err(self.not_found(id));
        }
        Ok(())
    }
}

/// Mock command session backed by a temporary config directory
pub struct MockCommandSession {
    _dir: TempDir,
    pub settings: Settings,
    pub paths: ConfigPaths,
    pub display_provider: MockDisplayProvider,
    pub interactive_provider: MockInteractiveProvider,
    pub credential_store: MemoryCredentialStore,
    pub transport: MockTransport,
    pub clock: FixedClock,
}

impl Default for MockCommandSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCommandSession {
    pub const API_URL: &'static str = "http://harbor.test:8010";

    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let paths = ConfigPaths::in_dir(dir.path());
        Self {
            _dir: dir,
            settings: Settings {
                api_url: Self::API_URL.to_string(),
                ..Settings::default()
            },
            paths,
            display_provider: MockDisplayProvider::new(),
            interactive_provider: MockInteractiveProvider::new(),
            credential_store: MemoryCredentialStore::new(),
            transport: MockTransport::new(),
            clock: FixedClock::at(1_000_000),
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_interactive(mut self, interactive: MockInteractiveProvider) -> Self {
        self.interactive_provider = interactive;
        self
    }

    pub fn with_credentials(mut self, store: MemoryCredentialStore) -> Self {
        self.credential_store = store;
        self
    }

    pub fn with_transport(mut self, transport: MockTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_clock(mut self, clock: FixedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Re-resolve settings from the session's config file plus `flags`
    pub fn reload(&mut self, flags: &crate::application::config::SettingsLayer) {
        let loaded = LoadedConfig::from_layers(self.paths.clone(), &Default::default(), flags)
            .unwrap();
        self.settings = loaded.settings;
    }
}

impl Session for MockCommandSession {
    fn display(&self) -> &dyn DisplayProvider {
        &self.display_provider
    }

    fn interactive(&self) -> &dyn InteractiveProvider {
        &self.interactive_provider
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    fn credentials(&self) -> &dyn CredentialStore {
        &self.credential_store
    }

    fn transport(&self) -> &dyn Transport {
        &self.transport
    }

    fn clock(&self) -> &dyn Clock {
        &self.clock
    }

    fn retry_delay(&self) -> Duration {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CredentialMode;

    #[test]
    fn test_mock_transport_scripts_by_route() {
        let transport = MockTransport::new()
            .respond(Method::Get, "/organizations", 500, "")
            .respond_always(Method::Get, "/organizations", 200, "[]");

        let request = ApiRequest::new(Method::Get, "http://h:1/organizations?page=1");
        assert_eq!(transport.execute(&request).unwrap().status, 500);
        assert_eq!(transport.execute(&request).unwrap().status, 200);
        assert_eq!(transport.execute(&request).unwrap().status, 200);
        assert_eq!(transport.count(Method::Get, "/organizations"), 3);

        let other = ApiRequest::new(Method::Delete, "http://h:1/organizations/1");
        assert!(matches!(
            transport.execute(&other),
            Err(NetworkError::Transport { .. })
        ));
    }

    #[test]
    fn test_memory_store_write_failures() {
        let store = MemoryCredentialStore::new().failing_writes();
        let credentials = Credentials {
            mode: CredentialMode::ApiKey,
            api_url: "http://h:1".to_string(),
            access_token: "k".to_string(),
            refresh_token: None,
            expires_at: None,
            raw_api_key: Some("k".to_string()),
        };
        assert!(store.save(&credentials).is_err());
        assert!(store.clear().is_err());
        assert_eq!(store.clear_count(), 1);
    }

    #[test]
    fn test_in_memory_catalog_crud() {
        let catalog = InMemoryCatalog::new().with_resource(
            ResourceKind::Organization,
            None,
            "1",
            "acme",
        );
        let service = catalog.service(ResourceKind::Organization, None).unwrap();

        let mut fields = FieldValues::new();
        fields.insert("name".to_string(), "globex".to_string());
        let created = service.create(&fields).unwrap();
        assert_eq!(service.list().unwrap().len(), 2);

        service.delete(&created.id).unwrap();
        assert!(service.get(&created.id).unwrap_err().is_not_found());
        assert_eq!(
            catalog.calls(),
            vec![
                "create organization".to_string(),
                "list organization".to_string(),
                format!("delete organization {}", created.id),
                format!("get organization {}", created.id),
            ]
        );
    }

    #[test]
    fn test_mock_interactive_non_terminal() {
        let prompts = MockInteractiveProvider::new().non_interactive();
        assert!(!prompts.is_interactive());
        assert!(prompts.password("Password").is_err());
        assert!(prompts.confirm("Sure?", true).unwrap());
    }
}
