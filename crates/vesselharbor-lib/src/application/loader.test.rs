use super::*;
use tempfile::TempDir;

#[test]
fn test_override_dir_holds_everything() {
    let dir = TempDir::new().unwrap();
    let paths = ConfigPaths::discover(Some(dir.path())).unwrap();
    assert_eq!(paths.config_file(), dir.path().join("config.toml"));
    assert_eq!(paths.credentials_file(), dir.path().join("credentials.json"));
}

#[test]
fn test_missing_file_is_empty_layer() {
    let dir = TempDir::new().unwrap();
    let paths = ConfigPaths::in_dir(dir.path());
    assert_eq!(paths.load_file_layer().unwrap(), SettingsLayer::default());
}

#[test]
fn test_update_preserves_other_keys() {
    let dir = TempDir::new().unwrap();
    let paths = ConfigPaths::in_dir(dir.path());

    paths
        .update_file_layer(|layer| layer.server_name = Some("h".to_string()))
        .unwrap();
    let layer = paths
        .update_file_layer(|layer| layer.server_port = Some("9".to_string()))
        .unwrap();

    assert_eq!(layer.server_name.as_deref(), Some("h"));
    assert_eq!(paths.load_file_layer().unwrap(), layer);

    let written = std::fs::read_to_string(paths.config_file()).unwrap();
    assert!(written.contains("server_name = \"h\""));
    assert!(!written.contains("api_key"));
}

#[test]
fn test_malformed_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let paths = ConfigPaths::in_dir(dir.path());
    std::fs::write(paths.config_file(), "server_port = [").unwrap();
    assert!(matches!(
        paths.load_file_layer(),
        Err(ConfigError::FileParse { .. })
    ));
}

#[test]
fn test_from_layers_applies_precedence_and_validation() {
    let dir = TempDir::new().unwrap();
    let paths = ConfigPaths::in_dir(dir.path());
    std::fs::write(
        paths.config_file(),
        "api_url = \"http://file\"\nusername = \"file-user\"\n",
    )
    .unwrap();

    let env_layer = SettingsLayer {
        username: Some("env-user".to_string()),
        ..SettingsLayer::default()
    };
    let flags = SettingsLayer {
        api_url: Some("http://flag".to_string()),
        ..SettingsLayer::default()
    };
    let loaded = LoadedConfig::from_layers(paths.clone(), &env_layer, &flags).unwrap();
    assert_eq!(loaded.settings.api_url, "http://flag");
    assert_eq!(loaded.settings.username, "env-user");

    let bad_port = SettingsLayer {
        server_port: Some("nine".to_string()),
        ..SettingsLayer::default()
    };
    // A bad port still loads; commands that contact the server reject it
    let loaded = LoadedConfig::from_layers(paths, &SettingsLayer::default(), &bad_port).unwrap();
    assert_eq!(loaded.settings.server_port, "nine");
    assert!(matches!(
        loaded.settings.validate(),
        Err(ConfigError::InvalidPort { .. })
    ));
}
