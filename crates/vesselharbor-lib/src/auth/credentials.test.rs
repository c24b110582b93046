use super::*;
use tempfile::TempDir;

fn sample() -> Credentials {
    Credentials {
        mode: CredentialMode::Password,
        api_url: "http://h:9".to_string(),
        access_token: "access-1".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: Some(1_000),
        raw_api_key: None,
    }
}

#[test]
fn test_load_without_session_is_none() {
    let dir = TempDir::new().unwrap();
    let store = FileCredentialStore::new(dir.path().join("credentials.json"));
    assert!(store.load().unwrap().is_none());
}

#[test]
fn test_save_load_clear_cycle() {
    let dir = TempDir::new().unwrap();
    let store = FileCredentialStore::new(dir.path().join("state").join("credentials.json"));

    store.save(&sample()).unwrap();
    assert_eq!(store.load().unwrap(), Some(sample()));

    store.clear().unwrap();
    assert!(store.load().unwrap().is_none());
    store.clear().unwrap();
}

#[cfg(target_family = "unix")]
#[test]
fn test_store_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let store = FileCredentialStore::new(dir.path().join("credentials.json"));
    store.save(&sample()).unwrap();

    let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o077, 0);
}

#[test]
fn test_corrupt_store_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    std::fs::write(&path, "{\"mode\": \"password\", \"access_").unwrap();

    let store = FileCredentialStore::new(&path);
    assert!(matches!(
        store.load(),
        Err(ConfigError::CredentialStoreCorrupt { .. })
    ));

    // Logging out recovers from a corrupt store
    store.clear().unwrap();
    assert!(store.load().unwrap().is_none());
}

#[test]
fn test_concurrent_writers_never_leave_partial_files() {
    use std::sync::Arc;
    use std::thread;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileCredentialStore::new(dir.path().join("credentials.json")));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut credentials = sample();
                credentials.access_token = format!("access-{i}-{}", "x".repeat(4096));
                for _ in 0..10 {
                    store.save(&credentials).unwrap();
                    assert!(store.load().unwrap().is_some());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let last = store.load().unwrap().unwrap();
    assert!(last.access_token.starts_with("access-"));
}

#[test]
fn test_expiry_arithmetic() {
    let credentials = sample();
    assert!(credentials.expires_within(950, 60));
    assert!(credentials.expires_within(1_005, 60));
    assert!(!credentials.expires_within(900, 60));
    assert_eq!(credentials.expires_in(995), Some(5));
    assert_eq!(credentials.expires_in(1_005), Some(-5));

    let open_ended = Credentials {
        expires_at: None,
        ..sample()
    };
    assert!(!open_ended.expires_within(u64::MAX, 60));
}

#[test]
fn test_server_binding_ignores_trailing_slash() {
    assert!(sample().is_for("http://h:9/"));
    assert!(!sample().is_for("http://other:9"));
}

#[test]
fn test_debug_redacts_tokens() {
    let rendered = format!("{:?}", sample());
    assert!(!rendered.contains("access-1"));
    assert!(!rendered.contains("refresh-1"));
}

#[test]
fn test_mode_serializes_snake_case() {
    let json = serde_json::to_string(&CredentialMode::ApiKey).unwrap();
    assert_eq!(json, "\"api_key\"");
}
