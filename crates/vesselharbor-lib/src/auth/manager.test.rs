use super::*;
use crate::application::session_mocks::{FixedClock, MemoryCredentialStore, MockTransport};
use crate::networking::RequestBody;
use crate::primitives::NetworkError;

const API: &str = "http://h:9";
const NOW: u64 = 1_000_000;

fn settings() -> Settings {
    Settings {
        api_url: API.to_string(),
        ..Settings::default()
    }
}

fn password_credentials(expires_at: Option<u64>) -> Credentials {
    Credentials {
        mode: CredentialMode::Password,
        api_url: API.to_string(),
        access_token: "old-access".to_string(),
        refresh_token: Some("old-refresh".to_string()),
        expires_at,
        raw_api_key: None,
    }
}

fn manager<'a>(
    store: &'a MemoryCredentialStore,
    transport: &'a MockTransport,
    clock: &'a FixedClock,
) -> SessionManager<'a> {
    SessionManager::new(store, transport, clock, RefreshPolicy::default())
}

#[test]
fn test_login_persists_tokens_with_expiry() {
    let store = MemoryCredentialStore::new();
    let transport = MockTransport::new().respond(
        Method::Post,
        "/login",
        200,
        r#"{"access_token": "a1", "refresh_token": "r1", "expires_in": 3600}"#,
    );
    let clock = FixedClock::at(NOW);

    let credentials = manager(&store, &transport, &clock)
        .login(&settings(), "alice", "s3cret")
        .unwrap();

    assert_eq!(credentials.access_token, "a1");
    assert_eq!(credentials.refresh_token.as_deref(), Some("r1"));
    assert_eq!(credentials.expires_at, Some(NOW + 3600));
    assert_eq!(store.current(), Some(credentials));

    let request = &transport.requests()[0];
    match &request.body {
        Some(RequestBody::Form(fields)) => {
            assert!(fields.contains(&("username".to_string(), "alice".to_string())));
            assert!(fields.contains(&("grant_type".to_string(), "password".to_string())));
        }
        other => panic!("expected form body, got {other:?}"),
    }
}

#[test]
fn test_login_accepts_cookie_tokens() {
    let store = MemoryCredentialStore::new();
    let transport = MockTransport::new().respond_with(
        Method::Post,
        "/login",
        ApiResponse::new(200, r#"{"status": "success"}"#)
            .with_header("Set-Cookie", "access_token=c1; Max-Age=900; HttpOnly")
            .with_header("Set-Cookie", "refresh_token=c2; Path=/"),
    );
    let clock = FixedClock::at(NOW);

    let credentials = manager(&store, &transport, &clock)
        .login(&settings(), "alice", "pw")
        .unwrap();
    assert_eq!(credentials.access_token, "c1");
    assert_eq!(credentials.refresh_token.as_deref(), Some("c2"));
    assert_eq!(credentials.expires_at, Some(NOW + 900));
}

#[test]
fn test_login_rejections() {
    let clock = FixedClock::at(NOW);

    let store = MemoryCredentialStore::new();
    let transport = MockTransport::new().respond(
        Method::Post,
        "/login",
        401,
        r#"{"detail": "Incorrect username or password"}"#,
    );
    let err = manager(&store, &transport, &clock)
        .login(&settings(), "alice", "wrong")
        .unwrap_err();
    match err {
        HarborError::Auth(AuthError::LoginRejected { message }) => {
            assert_eq!(message, "Incorrect username or password");
        }
        other => panic!("expected login rejection, got {other:?}"),
    }
    assert!(store.current().is_none());

    let transport = MockTransport::new().respond(
        Method::Post,
        "/login",
        200,
        r#"{"status": "error", "message": "account locked"}"#,
    );
    let err = manager(&store, &transport, &clock)
        .login(&settings(), "alice", "pw")
        .unwrap_err();
    assert!(err.to_string().contains("account locked"));

    let transport = MockTransport::new().respond(Method::Post, "/login", 503, "");
    let err = manager(&store, &transport, &clock)
        .login(&settings(), "alice", "pw")
        .unwrap_err();
    assert!(matches!(err, HarborError::Api(ApiError::Server { status: 503, .. })));

    let err = manager(&store, &transport, &clock)
        .login(&settings(), " ", "pw")
        .unwrap_err();
    assert!(matches!(err, HarborError::Auth(AuthError::LoginRejected { .. })));
}

#[test]
fn test_login_with_key_stores_raw_key() {
    let store = MemoryCredentialStore::new();
    let transport = MockTransport::new().respond(Method::Post, "/login", 200, r#"{"status": "success"}"#);
    let clock = FixedClock::at(NOW);

    let credentials = manager(&store, &transport, &clock)
        .login_with_key(&settings(), " key-123 ")
        .unwrap();
    assert_eq!(credentials.mode, CredentialMode::ApiKey);
    assert_eq!(credentials.raw_api_key.as_deref(), Some("key-123"));
    assert_eq!(credentials.expires_at, None);
    assert_eq!(credentials.refresh_token, None);
    assert_eq!(
        transport.requests()[0].header_value("x-api-key"),
        Some("key-123")
    );
}

#[test]
fn test_login_with_key_rejections() {
    let store = MemoryCredentialStore::new();
    let clock = FixedClock::at(NOW);

    let transport = MockTransport::new();
    let err = manager(&store, &transport, &clock)
        .login_with_key(&settings(), "bad key")
        .unwrap_err();
    assert!(matches!(err, HarborError::Auth(AuthError::InvalidApiKey { .. })));
    assert!(transport.requests().is_empty());

    let transport = MockTransport::new().respond(Method::Post, "/login", 403, "");
    let err = manager(&store, &transport, &clock)
        .login_with_key(&settings(), "key-123")
        .unwrap_err();
    assert!(matches!(err, HarborError::Auth(AuthError::InvalidApiKey { .. })));
    assert!(store.current().is_none());
}

#[test]
fn test_ensure_valid_without_session_needs_login() {
    let store = MemoryCredentialStore::new();
    let transport = MockTransport::new();
    let clock = FixedClock::at(NOW);

    let err = manager(&store, &transport, &clock)
        .ensure_valid(&settings())
        .unwrap_err();
    assert!(matches!(err, HarborError::Auth(AuthError::NeedsLogin { .. })));
    assert_eq!(err.exit_status(), crate::primitives::ExitStatus::Auth);
}

#[test]
fn test_ensure_valid_keeps_fresh_token() {
    let store = MemoryCredentialStore::with(password_credentials(Some(NOW + 3600)));
    let transport = MockTransport::new();
    let clock = FixedClock::at(NOW);

    let credentials = manager(&store, &transport, &clock)
        .ensure_valid(&settings())
        .unwrap();
    assert_eq!(credentials.access_token, "old-access");
    assert!(transport.requests().is_empty());
}

#[test]
fn test_ensure_valid_refreshes_expired_token() {
    let store = MemoryCredentialStore::with(password_credentials(Some(NOW - 10)));
    let transport = MockTransport::new().respond(
        Method::Post,
        "/refresh-token",
        200,
        r#"{"data": {"access_token": "new-access", "refresh_token": "new-refresh", "expires_in": 600}}"#,
    );
    let clock = FixedClock::at(NOW);

    let credentials = manager(&store, &transport, &clock)
        .ensure_valid(&settings())
        .unwrap();

    assert_eq!(credentials.access_token, "new-access");
    assert_eq!(credentials.refresh_token.as_deref(), Some("new-refresh"));
    assert!(credentials.expires_at.unwrap() > NOW);
    assert_eq!(store.current(), Some(credentials));
    assert_eq!(
        transport.requests()[0].header_value("authorization"),
        Some("Bearer old-refresh")
    );
}

#[test]
fn test_refresh_inside_safety_margin() {
    let store = MemoryCredentialStore::with(password_credentials(Some(NOW + 30)));
    let transport = MockTransport::new().respond(
        Method::Post,
        "/refresh-token",
        200,
        r#"{"access_token": "new-access", "expires_in": 600}"#,
    );
    let clock = FixedClock::at(NOW);

    let credentials = manager(&store, &transport, &clock)
        .ensure_valid(&settings())
        .unwrap();
    assert_eq!(credentials.access_token, "new-access");
    assert_eq!(transport.count(Method::Post, "/refresh-token"), 1);
}

#[test]
fn test_refresh_keeps_existing_token_when_rotation_disabled() {
    let store = MemoryCredentialStore::with(password_credentials(Some(NOW - 1)));
    let transport = MockTransport::new().respond(
        Method::Post,
        "/refresh-token",
        200,
        r#"{"access_token": "new-access", "refresh_token": "rotated", "expires_in": 600}"#,
    );
    let clock = FixedClock::at(NOW);
    let policy = RefreshPolicy {
        rotation: RefreshRotation::KeepExisting,
        ..RefreshPolicy::default()
    };

    let credentials = SessionManager::new(&store, &transport, &clock, policy)
        .ensure_valid(&settings())
        .unwrap();
    assert_eq!(credentials.refresh_token.as_deref(), Some("old-refresh"));
}

#[test]
fn test_refresh_without_new_refresh_token_keeps_old_one() {
    let store = MemoryCredentialStore::with(password_credentials(Some(NOW - 1)));
    let transport = MockTransport::new().respond(
        Method::Post,
        "/refresh-token",
        200,
        r#"{"access_token": "new-access", "expires_in": 600}"#,
    );
    let clock = FixedClock::at(NOW);

    let credentials = manager(&store, &transport, &clock)
        .ensure_valid(&settings())
        .unwrap();
    assert_eq!(credentials.refresh_token.as_deref(), Some("old-refresh"));
}

#[test]
fn test_rejected_refresh_token_clears_store() {
    let store = MemoryCredentialStore::with(password_credentials(Some(NOW - 1)));
    let transport = MockTransport::new().respond(Method::Post, "/refresh-token", 401, "");
    let clock = FixedClock::at(NOW);

    let err = manager(&store, &transport, &clock)
        .ensure_valid(&settings())
        .unwrap_err();
    assert!(matches!(err, HarborError::Auth(AuthError::NeedsLogin { .. })));
    assert!(store.current().is_none());
    assert_eq!(store.clear_count(), 1);
}

#[test]
fn test_failed_refresh_keeps_store() {
    let store = MemoryCredentialStore::with(password_credentials(Some(NOW - 1)));
    let transport = MockTransport::new()
        .respond(Method::Post, "/refresh-token", 500, "")
        .fail(
            Method::Post,
            "/refresh-token",
            NetworkError::Timeout {
                url: "http://h:9/refresh-token".to_string(),
            },
        );
    let clock = FixedClock::at(NOW);
    let manager = manager(&store, &transport, &clock);

    for _ in 0..2 {
        let err = manager.ensure_valid(&settings()).unwrap_err();
        assert!(matches!(err, HarborError::Auth(AuthError::NeedsLogin { .. })));
    }
    assert!(store.current().is_some());
    assert_eq!(transport.count(Method::Post, "/refresh-token"), 2);
}

#[test]
fn test_expired_without_refresh_token_needs_login() {
    let mut credentials = password_credentials(Some(NOW - 1));
    credentials.refresh_token = None;
    let store = MemoryCredentialStore::with(credentials);
    let transport = MockTransport::new();
    let clock = FixedClock::at(NOW);

    let err = manager(&store, &transport, &clock)
        .ensure_valid(&settings())
        .unwrap_err();
    assert!(matches!(err, HarborError::Auth(AuthError::NeedsLogin { .. })));
    assert!(transport.requests().is_empty());
}

#[test]
fn test_short_lived_refresh_result_is_rejected() {
    let store = MemoryCredentialStore::with(password_credentials(Some(NOW - 1)));
    let transport = MockTransport::new().respond(
        Method::Post,
        "/refresh-token",
        200,
        r#"{"access_token": "brief", "expires_in": 5}"#,
    );
    let clock = FixedClock::at(NOW);

    let err = manager(&store, &transport, &clock)
        .ensure_valid(&settings())
        .unwrap_err();
    assert!(matches!(err, HarborError::Auth(AuthError::NeedsLogin { .. })));
    assert_eq!(store.current().unwrap().access_token, "old-access");
}

#[test]
fn test_session_for_other_server_needs_login() {
    let store = MemoryCredentialStore::with(password_credentials(Some(NOW + 3600)));
    let transport = MockTransport::new();
    let clock = FixedClock::at(NOW);
    let other = Settings {
        api_url: "http://elsewhere:1".to_string(),
        ..Settings::default()
    };

    let err = manager(&store, &transport, &clock)
        .ensure_valid(&other)
        .unwrap_err();
    assert!(err.to_string().contains("elsewhere"));
}

#[test]
fn test_api_key_sessions_never_refresh() {
    let store = MemoryCredentialStore::with(Credentials {
        mode: CredentialMode::ApiKey,
        api_url: API.to_string(),
        access_token: "key-1".to_string(),
        refresh_token: None,
        expires_at: None,
        raw_api_key: Some("key-1".to_string()),
    });
    let transport = MockTransport::new();
    let clock = FixedClock::at(NOW);
    let manager = manager(&store, &transport, &clock);

    let credentials = manager.ensure_valid(&settings()).unwrap();
    let err = manager
        .refresh_rejected(&settings(), &credentials, "/organizations")
        .unwrap_err();
    assert!(matches!(err, HarborError::Auth(AuthError::Rejected { .. })));
    assert!(transport.requests().is_empty());
}

#[test]
fn test_logout_then_status_is_signed_out() {
    let store = MemoryCredentialStore::with(password_credentials(Some(NOW + 3600)));
    let transport = MockTransport::new();
    let clock = FixedClock::at(NOW);
    let manager = manager(&store, &transport, &clock);

    let status = manager.status(&settings()).unwrap();
    assert!(status.authenticated);
    assert_eq!(status.mode, Some(CredentialMode::Password));
    assert_eq!(status.expires_in, Some(3600));
    assert!(status.refreshable);

    assert!(matches!(manager.logout(), LogoutOutcome::Cleared));
    assert!(matches!(manager.logout(), LogoutOutcome::Cleared));

    let status = manager.status(&settings()).unwrap();
    assert!(!status.authenticated);
    assert_eq!(status.mode, None);
    assert!(matches!(
        manager.ensure_valid(&settings()).unwrap_err(),
        HarborError::Auth(AuthError::NeedsLogin { .. })
    ));
}

#[test]
fn test_logout_survives_storage_failure() {
    let store = MemoryCredentialStore::with(password_credentials(None)).failing_writes();
    let transport = MockTransport::new();
    let clock = FixedClock::at(NOW);

    let outcome = manager(&store, &transport, &clock).logout();
    assert!(matches!(
        outcome,
        LogoutOutcome::Retained(ConfigError::Storage { .. })
    ));
    assert_eq!(store.clear_count(), 1);
    assert!(store.load().unwrap().is_some());
}

#[test]
fn test_status_reports_expired_unrefreshable_session() {
    let mut credentials = password_credentials(Some(NOW - 100));
    credentials.refresh_token = None;
    let store = MemoryCredentialStore::with(credentials);
    let transport = MockTransport::new();
    let clock = FixedClock::at(NOW);

    let status = manager(&store, &transport, &clock)
        .status(&settings())
        .unwrap();
    assert!(!status.authenticated);
    assert_eq!(status.expires_in, Some(-100));
    assert!(transport.requests().is_empty());
}

#[test]
fn test_policy_from_settings() {
    let settings = Settings {
        refresh_margin_secs: 5,
        rotate_refresh_token: false,
        ..Settings::default()
    };
    let policy = RefreshPolicy::from_settings(&settings);
    assert_eq!(policy.safety_margin, 5);
    assert_eq!(policy.rotation, RefreshRotation::KeepExisting);
}
