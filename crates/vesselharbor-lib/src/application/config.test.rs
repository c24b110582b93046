use super::*;

fn layer() -> SettingsLayer {
    SettingsLayer::default()
}

#[test]
fn test_defaults_survive_empty_layers() {
    let settings = resolve(&Settings::default(), &layer(), &layer(), &layer());
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.api_url, "http://127.0.0.1:8010");
    assert_eq!(settings.server_name, "");
}

#[test]
fn test_direct_api_url_kept_without_server_pair() {
    let flags = SettingsLayer {
        api_url: Some("http://x".to_string()),
        server_name: Some(String::new()),
        server_port: Some(String::new()),
        ..layer()
    };
    let settings = resolve(&Settings::default(), &layer(), &layer(), &flags);
    assert_eq!(settings.api_url, "http://x");
}

#[test]
fn test_server_pair_overrides_api_url_from_any_layer() {
    let direct = SettingsLayer {
        api_url: Some("http://x".to_string()),
        ..layer()
    };
    let pair = SettingsLayer {
        server_name: Some("h".to_string()),
        server_port: Some("9".to_string()),
        ..layer()
    };

    // api_url set on a higher layer than the pair still loses
    let settings = resolve(&Settings::default(), &pair, &layer(), &direct);
    assert_eq!(settings.api_url, "http://h:9");

    let settings = resolve(&Settings::default(), &direct, &pair, &layer());
    assert_eq!(settings.api_url, "http://h:9");
}

#[test]
fn test_pair_assembled_across_layers() {
    let file = SettingsLayer {
        server_name: Some("harbor.internal".to_string()),
        ..layer()
    };
    let env = SettingsLayer {
        server_port: Some("8443".to_string()),
        ..layer()
    };
    let settings = resolve(&Settings::default(), &file, &env, &layer());
    assert_eq!(settings.api_url, "http://harbor.internal:8443");
}

#[test]
fn test_explicit_empty_value_disables_synthesis() {
    let file = SettingsLayer {
        server_name: Some("h".to_string()),
        server_port: Some("9".to_string()),
        ..layer()
    };
    let env = SettingsLayer {
        server_name: Some(String::new()),
        ..layer()
    };
    let settings = resolve(&Settings::default(), &file, &env, &layer());
    assert_eq!(settings.api_url, defaults::API_URL);
}

#[test]
fn test_later_layers_override_field_by_field() {
    let file = SettingsLayer {
        username: Some("file-user".to_string()),
        api_key: Some("file-key".to_string()),
        timeout_secs: Some(10),
        ..layer()
    };
    let env = SettingsLayer {
        username: Some("env-user".to_string()),
        ..layer()
    };
    let flags = SettingsLayer {
        verbose: Some(true),
        ..layer()
    };
    let settings = resolve(&Settings::default(), &file, &env, &flags);
    assert_eq!(settings.username, "env-user");
    assert_eq!(settings.api_key, "file-key");
    assert_eq!(settings.timeout_secs, 10);
    assert!(settings.verbose);
}

#[test]
fn test_compose_keeps_explicit_scheme() {
    assert_eq!(compose_api_url("https://h/", "9"), "https://h:9");
    assert_eq!(compose_api_url("h", "9"), "http://h:9");
}

#[test]
fn test_validate_rejects_bad_ports() {
    let mut settings = Settings::default();
    settings.server_port = "abc".to_string();
    assert!(matches!(
        settings.validate(),
        Err(ConfigError::InvalidPort { .. })
    ));

    settings.server_port = "70000".to_string();
    assert!(settings.validate().is_err());

    settings.server_port = "0".to_string();
    assert!(settings.validate().is_err());

    settings.server_port = "8010".to_string();
    assert!(settings.validate().is_ok());
}

#[test]
fn test_credential_mode_selection() {
    let mut settings = Settings::default();
    assert!(matches!(
        settings.credential_mode(),
        Err(ConfigError::MissingCredentials)
    ));

    settings.api_key = "key-123".to_string();
    assert_eq!(settings.credential_mode().unwrap(), CredentialMode::ApiKey);

    settings.username = "alice".to_string();
    assert_eq!(settings.credential_mode().unwrap(), CredentialMode::Password);
}

#[test]
fn test_endpoint_joins_paths() {
    let mut settings = Settings::default();
    settings.api_url = "http://h:9/".to_string();
    assert_eq!(settings.endpoint("/organizations"), "http://h:9/organizations");
    assert_eq!(settings.endpoint("login"), "http://h:9/login");
}

#[test]
fn test_debug_output_redacts_secrets() {
    let settings = Settings {
        password: "hunter2".to_string(),
        api_key: "sk-live".to_string(),
        ..Settings::default()
    };
    let rendered = format!("{settings:?}");
    assert!(!rendered.contains("hunter2"));
    assert!(!rendered.contains("sk-live"));
    assert!(rendered.contains("<redacted>"));
}

#[test]
fn test_layer_accepts_numeric_and_string_ports() {
    let numeric: SettingsLayer = toml::from_str("server_port = 9").unwrap();
    assert_eq!(numeric.server_port.as_deref(), Some("9"));

    let text: SettingsLayer = toml::from_str("server_port = \"9\"").unwrap();
    assert_eq!(text.server_port.as_deref(), Some("9"));

    let missing: SettingsLayer = toml::from_str("api_url = \"http://x\"").unwrap();
    assert_eq!(missing.server_port, None);
}
