use super::*;
use crate::application::session_mocks::{FixedClock, MemoryCredentialStore, MockTransport};
use crate::auth::RefreshPolicy;

const API: &str = "http://h:9";
const NOW: u64 = 1_000_000;

fn settings() -> Settings {
    Settings {
        api_url: API.to_string(),
        ..Settings::default()
    }
}

fn bearer(access: &str) -> Credentials {
    Credentials {
        mode: CredentialMode::Password,
        api_url: API.to_string(),
        access_token: access.to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: Some(NOW + 3600),
        raw_api_key: None,
    }
}

fn timeout() -> NetworkError {
    NetworkError::Timeout {
        url: format!("{API}/organizations"),
    }
}

const REFRESHED: &str = r#"{"access_token": "access-2", "expires_in": 3600}"#;

#[test]
fn test_send_attaches_bearer_token() {
    let store = MemoryCredentialStore::with(bearer("access-1"));
    let transport = MockTransport::new().respond(Method::Get, "/organizations", 200, "[]");
    let clock = FixedClock::at(NOW);
    let manager = SessionManager::new(&store, &transport, &clock, RefreshPolicy::default());
    let gateway = RequestGateway::new(&transport, &manager).with_retry_delay(Duration::ZERO);
    let session = ApiSession::new(settings());

    let response = gateway
        .send(&session, Method::Get, "/organizations", None)
        .unwrap();

    assert_eq!(response.status, 200);
    assert!(session.is_valid());
    let request = &transport.requests()[0];
    assert_eq!(request.url, "http://h:9/organizations");
    assert_eq!(request.header_value("authorization"), Some("Bearer access-1"));
    assert_eq!(request.header_value("accept"), Some("application/json"));
}

#[test]
fn test_401_refreshes_once_and_retries() {
    let store = MemoryCredentialStore::with(bearer("access-1"));
    let transport = MockTransport::new()
        .respond(Method::Get, "/organizations", 401, "")
        .respond(Method::Get, "/organizations", 200, "[]")
        .respond(Method::Post, "/refresh-token", 200, REFRESHED);
    let clock = FixedClock::at(NOW);
    let manager = SessionManager::new(&store, &transport, &clock, RefreshPolicy::default());
    let gateway = RequestGateway::new(&transport, &manager).with_retry_delay(Duration::ZERO);
    let session = ApiSession::new(settings());

    gateway
        .send(&session, Method::Get, "/organizations", None)
        .unwrap();

    assert_eq!(transport.count(Method::Post, "/refresh-token"), 1);
    let attempts = transport.requests_to(Method::Get, "/organizations");
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[1].header_value("authorization"), Some("Bearer access-2"));
    assert_eq!(session.credentials().unwrap().access_token, "access-2");
    assert_eq!(store.current().unwrap().access_token, "access-2");
}

#[test]
fn test_second_401_is_rejected_without_another_refresh() {
    let store = MemoryCredentialStore::with(bearer("access-1"));
    let transport = MockTransport::new()
        .respond_always(Method::Get, "/organizations", 401, "")
        .respond_always(Method::Post, "/refresh-token", 200, REFRESHED);
    let clock = FixedClock::at(NOW);
    let manager = SessionManager::new(&store, &transport, &clock, RefreshPolicy::default());
    let gateway = RequestGateway::new(&transport, &manager).with_retry_delay(Duration::ZERO);
    let session = ApiSession::new(settings());

    let err = gateway
        .send(&session, Method::Get, "/organizations", None)
        .unwrap_err();

    assert!(matches!(err, HarborError::Auth(AuthError::Rejected { .. })));
    assert!(!session.is_valid());
    assert_eq!(transport.count(Method::Post, "/refresh-token"), 1);
    assert_eq!(transport.count(Method::Get, "/organizations"), 2);
}

#[test]
fn test_failed_reactive_refresh_needs_login() {
    let store = MemoryCredentialStore::with(bearer("access-1"));
    let transport = MockTransport::new()
        .respond(Method::Get, "/organizations", 401, "")
        .respond(Method::Post, "/refresh-token", 401, "");
    let clock = FixedClock::at(NOW);
    let manager = SessionManager::new(&store, &transport, &clock, RefreshPolicy::default());
    let gateway = RequestGateway::new(&transport, &manager).with_retry_delay(Duration::ZERO);
    let session = ApiSession::new(settings());

    let err = gateway
        .send(&session, Method::Get, "/organizations", None)
        .unwrap_err();

    assert!(matches!(err, HarborError::Auth(AuthError::NeedsLogin { .. })));
    assert!(!session.is_valid());
    assert!(store.current().is_none());
    assert_eq!(transport.count(Method::Get, "/organizations"), 1);
}

#[test]
fn test_missing_session_sends_nothing() {
    let store = MemoryCredentialStore::new();
    let transport = MockTransport::new();
    let clock = FixedClock::at(NOW);
    let manager = SessionManager::new(&store, &transport, &clock, RefreshPolicy::default());
    let gateway = RequestGateway::new(&transport, &manager);
    let session = ApiSession::new(settings());

    let err = gateway
        .send(&session, Method::Get, "/organizations", None)
        .unwrap_err();
    assert!(matches!(err, HarborError::Auth(AuthError::NeedsLogin { .. })));
    assert!(transport.requests().is_empty());
}

#[test]
fn test_idempotent_request_retried_once_after_timeout() {
    let store = MemoryCredentialStore::with(bearer("access-1"));
    let transport = MockTransport::new()
        .fail(Method::Get, "/organizations", timeout())
        .respond(Method::Get, "/organizations", 200, "[]");
    let clock = FixedClock::at(NOW);
    let manager = SessionManager::new(&store, &transport, &clock, RefreshPolicy::default());
    let gateway = RequestGateway::new(&transport, &manager).with_retry_delay(Duration::ZERO);
    let session = ApiSession::new(settings());

    let response = gateway
        .send(&session, Method::Get, "/organizations", None)
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(transport.count(Method::Get, "/organizations"), 2);
}

#[test]
fn test_idempotent_retry_gives_up_after_second_failure() {
    let store = MemoryCredentialStore::with(bearer("access-1"));
    let transport = MockTransport::new()
        .fail(Method::Delete, "/organizations/1", timeout())
        .fail(Method::Delete, "/organizations/1", timeout())
        .respond(Method::Delete, "/organizations/1", 204, "");
    let clock = FixedClock::at(NOW);
    let manager = SessionManager::new(&store, &transport, &clock, RefreshPolicy::default());
    let gateway = RequestGateway::new(&transport, &manager).with_retry_delay(Duration::ZERO);
    let session = ApiSession::new(settings());

    let err = gateway
        .send(&session, Method::Delete, "/organizations/1", None)
        .unwrap_err();
    assert!(matches!(err, HarborError::Network(NetworkError::Timeout { .. })));
    assert_eq!(err.exit_status(), crate::primitives::ExitStatus::Network);
    assert_eq!(transport.count(Method::Delete, "/organizations/1"), 2);
}

#[test]
fn test_non_idempotent_request_is_not_retried() {
    let store = MemoryCredentialStore::with(bearer("access-1"));
    let transport = MockTransport::new()
        .fail(Method::Post, "/organizations", timeout())
        .respond(Method::Post, "/organizations", 201, r#"{"id": 1}"#);
    let clock = FixedClock::at(NOW);
    let manager = SessionManager::new(&store, &transport, &clock, RefreshPolicy::default());
    let gateway = RequestGateway::new(&transport, &manager).with_retry_delay(Duration::ZERO);
    let session = ApiSession::new(settings());

    let body = serde_json::json!({"name": "acme"});
    let err = gateway
        .send(&session, Method::Post, "/organizations", Some(&body))
        .unwrap_err();
    assert!(matches!(err, HarborError::Network(_)));
    assert_eq!(transport.count(Method::Post, "/organizations"), 1);
}

#[test]
fn test_permanent_network_error_is_not_retried() {
    let store = MemoryCredentialStore::with(bearer("access-1"));
    let transport = MockTransport::new().fail(
        Method::Get,
        "/organizations",
        NetworkError::Transport {
            url: format!("{API}/organizations"),
            reason: "bad certificate".to_string(),
        },
    );
    let clock = FixedClock::at(NOW);
    let manager = SessionManager::new(&store, &transport, &clock, RefreshPolicy::default());
    let gateway = RequestGateway::new(&transport, &manager).with_retry_delay(Duration::ZERO);
    let session = ApiSession::new(settings());

    assert!(gateway
        .send(&session, Method::Get, "/organizations", None)
        .is_err());
    assert_eq!(transport.count(Method::Get, "/organizations"), 1);
}

#[test]
fn test_api_key_mode_uses_key_header_and_never_refreshes() {
    let store = MemoryCredentialStore::with(Credentials {
        mode: CredentialMode::ApiKey,
        api_url: API.to_string(),
        access_token: "issued".to_string(),
        refresh_token: None,
        expires_at: None,
        raw_api_key: Some("key-1".to_string()),
    });
    let transport = MockTransport::new()
        .respond(Method::Get, "/organizations", 200, "[]")
        .respond(Method::Get, "/organizations", 401, "");
    let clock = FixedClock::at(NOW);
    let manager = SessionManager::new(&store, &transport, &clock, RefreshPolicy::default());
    let gateway = RequestGateway::new(&transport, &manager).with_retry_delay(Duration::ZERO);
    let session = ApiSession::new(settings());

    gateway
        .send(&session, Method::Get, "/organizations", None)
        .unwrap();
    let first = &transport.requests()[0];
    assert_eq!(first.header_value("x-api-key"), Some("key-1"));
    assert_eq!(first.header_value("authorization"), None);

    let err = gateway
        .send(&session, Method::Get, "/organizations", None)
        .unwrap_err();
    assert!(matches!(err, HarborError::Auth(AuthError::Rejected { .. })));
    assert_eq!(transport.count(Method::Post, "/refresh-token"), 0);
}

#[test]
fn test_error_statuses_become_api_errors() {
    let store = MemoryCredentialStore::with(bearer("access-1"));
    let transport = MockTransport::new()
        .respond(Method::Get, "/organizations/9", 404, r#"{"detail": "missing"}"#)
        .respond(Method::Get, "/organizations/8", 403, r#"{"message": "not yours"}"#);
    let clock = FixedClock::at(NOW);
    let manager = SessionManager::new(&store, &transport, &clock, RefreshPolicy::default());
    let gateway = RequestGateway::new(&transport, &manager).with_retry_delay(Duration::ZERO);
    let session = ApiSession::new(settings());

    let err = gateway
        .send(&session, Method::Get, "/organizations/9", None)
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.exit_status(), crate::primitives::ExitStatus::Api);

    let err = gateway
        .send(&session, Method::Get, "/organizations/8", None)
        .unwrap_err();
    assert!(matches!(err, HarborError::Api(ApiError::Forbidden { .. })));
}

#[test]
fn test_expiring_token_refreshed_before_request() {
    let mut credentials = bearer("access-1");
    credentials.expires_at = Some(NOW + 10);
    let store = MemoryCredentialStore::with(credentials);
    let transport = MockTransport::new()
        .respond(Method::Post, "/refresh-token", 200, REFRESHED)
        .respond(Method::Get, "/organizations", 200, "[]");
    let clock = FixedClock::at(NOW);
    let manager = SessionManager::new(&store, &transport, &clock, RefreshPolicy::default());
    let gateway = RequestGateway::new(&transport, &manager).with_retry_delay(Duration::ZERO);
    let session = ApiSession::new(settings());

    gateway
        .send(&session, Method::Get, "/organizations", None)
        .unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].method, Method::Post);
    assert_eq!(requests[1].header_value("authorization"), Some("Bearer access-2"));
}
