use super::*;
use crate::application::config::Settings;
use crate::application::session_mocks::MemoryCredentialStore;
use crate::auth::{CredentialMode, Credentials, RefreshPolicy, SessionManager, SystemClock};
use crate::networking::ReqwestTransport;
use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;

struct Harness {
    server: mockito::ServerGuard,
    store: MemoryCredentialStore,
    transport: ReqwestTransport,
    clock: SystemClock,
}

impl Harness {
    fn new() -> Self {
        let server = Server::new();
        let store = MemoryCredentialStore::with(Credentials {
            mode: CredentialMode::Password,
            api_url: server.url(),
            access_token: "token-1".to_string(),
            refresh_token: None,
            expires_at: None,
            raw_api_key: None,
        });
        Self {
            server,
            store,
            transport: ReqwestTransport::new(Duration::from_secs(5)).unwrap(),
            clock: SystemClock,
        }
    }

    fn settings(&self) -> Settings {
        Settings {
            api_url: self.server.url(),
            ..Settings::default()
        }
    }

    fn manager(&self) -> SessionManager<'_> {
        SessionManager::new(
            &self.store,
            &self.transport,
            &self.clock,
            RefreshPolicy::default(),
        )
    }
}

#[test]
fn test_list_organizations_accepts_data_envelope() {
    let mut h = Harness::new();
    let mock = h
        .server
        .mock("GET", "/organizations?skip=0&limit=100")
        .match_header("authorization", "Bearer token-1")
        .with_status(200)
        .with_body(r#"{"data": [{"id": 1, "name": "acme"}, {"id": "b2", "name": "globex", "description": null}]}"#)
        .create();

    let manager = h.manager();
    let gateway = RequestGateway::new(&h.transport, &manager);
    let session = ApiSession::new(h.settings());
    let service = HttpResourceService::organizations(&gateway, &session);

    let items = service.list().unwrap();
    mock.assert();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "1");
    assert_eq!(items[0].name, "acme");
    assert_eq!(items[1].id, "b2");
    assert_eq!(items[1].description, None);
}

fn numbered(range: std::ops::Range<usize>) -> String {
    let items: Vec<_> = range
        .map(|n| json!({"id": n, "name": format!("org-{n}")}))
        .collect();
    json!({ "data": items }).to_string()
}

#[test]
fn test_list_follows_pages_until_a_short_one() {
    let mut h = Harness::new();
    let first = h
        .server
        .mock("GET", "/organizations?skip=0&limit=100")
        .with_status(200)
        .with_body(numbered(0..100))
        .create();
    let second = h
        .server
        .mock("GET", "/organizations?skip=100&limit=100")
        .with_status(200)
        .with_body(numbered(100..103))
        .create();

    let manager = h.manager();
    let gateway = RequestGateway::new(&h.transport, &manager);
    let session = ApiSession::new(h.settings());
    let service = HttpResourceService::organizations(&gateway, &session);

    let items = service.list().unwrap();
    first.assert();
    second.assert();
    assert_eq!(items.len(), 103);
    assert_eq!(items[102].name, "org-102");
}

#[test]
fn test_list_stops_when_the_server_ignores_the_offset() {
    let mut h = Harness::new();
    let mock = h
        .server
        .mock("GET", "/organizations")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(numbered(0..100))
        .expect(2)
        .create();

    let manager = h.manager();
    let gateway = RequestGateway::new(&h.transport, &manager);
    let session = ApiSession::new(h.settings());
    let service = HttpResourceService::organizations(&gateway, &session);

    let items = service.list().unwrap();
    mock.assert();
    assert_eq!(items.len(), 100);
}

#[test]
fn test_list_accepts_bare_array() {
    let mut h = Harness::new();
    h.server
        .mock("GET", "/organizations/7/environments?skip=0&limit=100")
        .with_status(200)
        .with_body(r#"[{"id": 3, "name": "staging", "description": "pre-prod"}]"#)
        .create();

    let manager = h.manager();
    let gateway = RequestGateway::new(&h.transport, &manager);
    let session = ApiSession::new(h.settings());
    let service = HttpResourceService::environments(&gateway, &session, "7");

    let items = service.list().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, ResourceKind::Environment);
    assert_eq!(items[0].description.as_deref(), Some("pre-prod"));
}

#[test]
fn test_get_keeps_etag_and_escapes_id() {
    let mut h = Harness::new();
    h.server
        .mock("GET", "/organizations/a%20b")
        .with_status(200)
        .with_header("ETag", "\"rev-4\"")
        .with_body(r#"{"data": {"id": "a b", "name": "spaced"}}"#)
        .create();

    let manager = h.manager();
    let gateway = RequestGateway::new(&h.transport, &manager);
    let session = ApiSession::new(h.settings());
    let service = HttpResourceService::organizations(&gateway, &session);

    let resource = service.get("a b").unwrap();
    assert_eq!(resource.id, "a b");
    assert_eq!(resource.etag.as_deref(), Some("\"rev-4\""));
}

#[test]
fn test_get_unknown_id_is_not_found() {
    let mut h = Harness::new();
    h.server
        .mock("GET", "/organizations/99")
        .with_status(404)
        .with_body(r#"{"detail": "Organization not found"}"#)
        .create();

    let manager = h.manager();
    let gateway = RequestGateway::new(&h.transport, &manager);
    let session = ApiSession::new(h.settings());
    let service = HttpResourceService::organizations(&gateway, &session);

    let err = service.get("99").unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("Organization not found"));
}

#[test]
fn test_create_omits_blank_description() {
    let mut h = Harness::new();
    let mock = h
        .server
        .mock("POST", "/organizations")
        .match_body(Matcher::Json(json!({"name": "acme"})))
        .with_status(201)
        .with_body(r#"{"id": 10, "name": "acme"}"#)
        .expect(1)
        .create();

    let manager = h.manager();
    let gateway = RequestGateway::new(&h.transport, &manager);
    let session = ApiSession::new(h.settings());
    let service = HttpResourceService::organizations(&gateway, &session);

    let mut fields = FieldValues::new();
    fields.insert("name".to_string(), " acme ".to_string());
    fields.insert("description".to_string(), "".to_string());

    let created = service.create(&fields).unwrap();
    mock.assert();
    assert_eq!(created.id, "10");
}

#[test]
fn test_create_validation_error_names_fields() {
    let mut h = Harness::new();
    h.server
        .mock("POST", "/organizations")
        .with_status(422)
        .with_body(r#"{"detail": [{"loc": ["body", "name"], "msg": "name already taken"}]}"#)
        .create();

    let manager = h.manager();
    let gateway = RequestGateway::new(&h.transport, &manager);
    let session = ApiSession::new(h.settings());
    let service = HttpResourceService::organizations(&gateway, &session);

    let mut fields = FieldValues::new();
    fields.insert("name".to_string(), "acme".to_string());

    match service.create(&fields).unwrap_err() {
        HarborError::Api(ApiError::Validation { message, fields }) => {
            assert_eq!(message, "name already taken");
            assert_eq!(fields, vec!["name".to_string()]);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn test_update_puts_fields_and_delete_hits_item() {
    let mut h = Harness::new();
    let put = h
        .server
        .mock("PUT", "/organizations/5")
        .match_body(Matcher::Json(json!({"name": "renamed", "description": ""})))
        .with_status(200)
        .with_body(r#"{"id": 5, "name": "renamed"}"#)
        .expect(1)
        .create();
    let delete = h
        .server
        .mock("DELETE", "/organizations/5")
        .with_status(204)
        .expect(1)
        .create();

    let manager = h.manager();
    let gateway = RequestGateway::new(&h.transport, &manager);
    let session = ApiSession::new(h.settings());
    let service = HttpResourceService::organizations(&gateway, &session);

    let mut fields = FieldValues::new();
    fields.insert("name".to_string(), "renamed".to_string());
    fields.insert("description".to_string(), "".to_string());

    assert_eq!(service.update("5", &fields).unwrap().name, "renamed");
    service.delete("5").unwrap();
    put.assert();
    delete.assert();
}

#[test]
fn test_item_without_id_is_decode_error() {
    let err = parse_resource(&json!({"name": "ghost"}), ResourceKind::Organization).unwrap_err();
    assert!(matches!(err, ApiError::Decode { .. }));
}

#[test]
fn test_catalog_requires_scope_for_environments() {
    let h = Harness::new();
    let manager = h.manager();
    let gateway = RequestGateway::new(&h.transport, &manager);
    let session = ApiSession::new(h.settings());
    let catalog = HttpResourceCatalog::new(&gateway, &session);

    assert!(catalog.service(ResourceKind::Organization, None).is_ok());
    let err = catalog
        .service(ResourceKind::Environment, None)
        .err()
        .unwrap();
    assert!(matches!(err, HarborError::Api(ApiError::Validation { .. })));

    let service = catalog.service(ResourceKind::Environment, Some("org/1")).unwrap();
    assert_eq!(service.kind(), ResourceKind::Environment);
}

#[test]
fn test_environment_path_escapes_organization() {
    let h = Harness::new();
    let manager = h.manager();
    let gateway = RequestGateway::new(&h.transport, &manager);
    let session = ApiSession::new(h.settings());
    let service = HttpResourceService::environments(&gateway, &session, "org/1");
    assert_eq!(service.collection_path(), "/organizations/org%2F1/environments");
}
