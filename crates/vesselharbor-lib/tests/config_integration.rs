use std::fs;
use tempfile::TempDir;
use vesselharbor_lib::application::config::SettingsLayer;
use vesselharbor_lib::application::env::settings_from_vars;
use vesselharbor_lib::application::loader::{ConfigPaths, LoadedConfig};
use vesselharbor_lib::auth::{CredentialMode, CredentialStore, Credentials, FileCredentialStore};
use vesselharbor_lib::primitives::ConfigError;

fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[test]
fn test_layers_apply_in_precedence_order() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "api_url = \"http://file:1\"\nusername = \"file-user\"\ntimeout_secs = 5\n",
    )
    .unwrap();

    let env = settings_from_vars(vars(&[
        ("VESSELHARBOR_USERNAME", "env-user"),
        ("VESSELHARBOR_TIMEOUT_SECS", "7"),
    ]))
    .unwrap();
    let flags = SettingsLayer {
        timeout_secs: Some(9),
        ..SettingsLayer::default()
    };

    let loaded = LoadedConfig::from_layers(ConfigPaths::in_dir(dir.path()), &env, &flags).unwrap();

    assert_eq!(loaded.settings.api_url, "http://file:1");
    assert_eq!(loaded.settings.username, "env-user");
    assert_eq!(loaded.settings.timeout_secs, 9);
}

#[test]
fn test_integer_port_in_file_composes_url() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "server_name = \"harbor.internal\"\nserver_port = 8443\n",
    )
    .unwrap();

    let loaded = LoadedConfig::from_layers(
        ConfigPaths::in_dir(dir.path()),
        &SettingsLayer::default(),
        &SettingsLayer::default(),
    )
    .unwrap();

    assert_eq!(loaded.settings.api_url, "http://harbor.internal:8443");
}

#[test]
fn test_empty_env_server_name_disables_composition() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "api_url = \"http://file:1\"\nserver_name = \"h\"\nserver_port = \"9\"\n",
    )
    .unwrap();

    let env = settings_from_vars(vars(&[("VESSELHARBOR_SERVER_NAME", "")])).unwrap();
    let loaded = LoadedConfig::from_layers(
        ConfigPaths::in_dir(dir.path()),
        &env,
        &SettingsLayer::default(),
    )
    .unwrap();

    assert_eq!(loaded.settings.api_url, "http://file:1");
}

#[test]
fn test_bad_port_in_file_loads_but_fails_validation() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.toml"), "server_port = \"http\"\n").unwrap();

    let loaded = LoadedConfig::from_layers(
        ConfigPaths::in_dir(dir.path()),
        &SettingsLayer::default(),
        &SettingsLayer::default(),
    )
    .unwrap();

    let err = loaded.settings.validate().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidPort { .. }));
}

#[test]
fn test_malformed_file_is_reported_with_path() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.toml"), "api_url = [").unwrap();

    let err = ConfigPaths::in_dir(dir.path()).load_file_layer().unwrap_err();
    assert!(err.to_string().contains("config.toml"));
}

#[test]
fn test_credentials_survive_a_new_store_instance() {
    let dir = TempDir::new().unwrap();
    let paths = ConfigPaths::in_dir(dir.path());
    let credentials = Credentials {
        mode: CredentialMode::Password,
        api_url: "http://h:9".to_string(),
        access_token: "access".to_string(),
        refresh_token: Some("refresh".to_string()),
        expires_at: Some(42),
        raw_api_key: None,
    };

    FileCredentialStore::new(paths.credentials_file())
        .save(&credentials)
        .unwrap();
    let loaded = FileCredentialStore::new(paths.credentials_file())
        .load()
        .unwrap();

    assert_eq!(loaded, Some(credentials));
}

#[test]
fn test_corrupt_credential_store_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let paths = ConfigPaths::in_dir(dir.path());
    fs::write(paths.credentials_file(), "{not json").unwrap();

    let err = FileCredentialStore::new(paths.credentials_file())
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigError::CredentialStoreCorrupt { .. }));
}
