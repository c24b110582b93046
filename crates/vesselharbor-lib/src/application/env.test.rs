use super::*;

fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[test]
fn test_prefixed_variables_populate_layer() {
    let layer = settings_from_vars(vars(&[
        ("VESSELHARBOR_API_URL", "http://x"),
        ("VESSELHARBOR_SERVER_NAME", "h"),
        ("VESSELHARBOR_SERVER_PORT", "9"),
        ("VESSELHARBOR_USERNAME", "alice"),
        ("VESSELHARBOR_PASSWORD", "secret"),
        ("VESSELHARBOR_API_KEY", "key"),
        ("VESSELHARBOR_REFRESH_MARGIN_SECS", "120"),
        ("VESSELHARBOR_ROTATE_REFRESH_TOKEN", "false"),
        ("HOME", "/home/alice"),
    ]))
    .unwrap();

    assert_eq!(layer.api_url.as_deref(), Some("http://x"));
    assert_eq!(layer.server_name.as_deref(), Some("h"));
    assert_eq!(layer.server_port.as_deref(), Some("9"));
    assert_eq!(layer.username.as_deref(), Some("alice"));
    assert_eq!(layer.password.as_deref(), Some("secret"));
    assert_eq!(layer.api_key.as_deref(), Some("key"));
    assert_eq!(layer.refresh_margin_secs, Some(120));
    assert_eq!(layer.rotate_refresh_token, Some(false));
    assert_eq!(layer.timeout_secs, None);
}

#[test]
fn test_unrelated_prefixed_variables_are_ignored() {
    let layer = settings_from_vars(vars(&[
        ("VESSELHARBOR_CONFIG_DIR", "/tmp/x"),
        ("VESSELHARBOR_LOG_LEVEL", "3"),
    ]))
    .unwrap();
    assert_eq!(layer, SettingsLayer::default());
}

#[test]
fn test_empty_variable_is_present() {
    let layer = settings_from_vars(vars(&[("VESSELHARBOR_SERVER_NAME", "")])).unwrap();
    assert_eq!(layer.server_name.as_deref(), Some(""));
}

#[test]
fn test_malformed_number_is_config_error() {
    let result = settings_from_vars(vars(&[("VESSELHARBOR_TIMEOUT_SECS", "soon")]));
    assert!(matches!(
        result,
        Err(ConfigError::EnvironmentParsingFailed { .. })
    ));
}

#[test]
fn test_color_precedence() {
    let plain = ColorEnvironment::default();
    assert!(plain.color_enabled(true));
    assert!(!plain.color_enabled(false));

    let ci = ColorEnvironment {
        ci: Some("true".to_string()),
        ..Default::default()
    };
    assert!(!ci.color_enabled(true));

    let no_color = ColorEnvironment {
        no_color: Some("1".to_string()),
        ..Default::default()
    };
    assert!(!no_color.color_enabled(true));

    let forced = ColorEnvironment {
        no_color: Some("1".to_string()),
        force_color: Some("1".to_string()),
        ..Default::default()
    };
    assert!(forced.color_enabled(false));
}
