use super::*;

#[test]
fn test_log_level_from_verbosity() {
    assert_eq!(LogLevel::from_verbosity(0), LogLevel::Error);
    assert_eq!(LogLevel::from_verbosity(2), LogLevel::Info);
    assert_eq!(LogLevel::from_verbosity(9), LogLevel::Trace);
}

#[test]
fn test_log_format_aliases_parse() {
    assert_eq!("plain".parse::<LogFormat>().unwrap(), LogFormat::Text);
    assert_eq!("human".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
    assert!("yaml".parse::<LogFormat>().is_err());
}

#[test]
fn test_exit_codes_are_stable() {
    assert_eq!(ExitStatus::Success.code(), 0);
    assert_eq!(ExitStatus::Failure.code(), 1);
    assert_eq!(ExitStatus::Auth.code(), 2);
    assert_eq!(ExitStatus::Config.code(), 3);
    assert_eq!(ExitStatus::Network.code(), 4);
    assert_eq!(ExitStatus::Api.code(), 5);
}

#[test]
fn test_exit_status_walks_context_chain() {
    use anyhow::Context;

    let result: Result<(), HarborError> = Err(AuthError::NeedsLogin {
        reason: "no stored session".to_string(),
    }
    .into());
    let error = result.context("Failed to list organizations").unwrap_err();
    assert_eq!(ExitStatus::from_error(&error), ExitStatus::Auth);

    let bare = anyhow::Error::new(ConfigError::MissingCredentials);
    assert_eq!(ExitStatus::from_error(&bare), ExitStatus::Config);

    let other = anyhow::anyhow!("something else");
    assert_eq!(ExitStatus::from_error(&other), ExitStatus::Failure);
}

#[test]
fn test_harbor_error_families() {
    let network: HarborError = NetworkError::Timeout {
        url: "http://x/organizations".to_string(),
    }
    .into();
    assert_eq!(network.exit_status(), ExitStatus::Network);
    assert!(!network.is_fatal());

    let api: HarborError = ApiError::NotFound {
        message: "organization 7".to_string(),
    }
    .into();
    assert!(api.is_not_found());
    assert_eq!(api.exit_status(), ExitStatus::Api);

    let auth: HarborError = AuthError::Rejected {
        path: "/organizations".to_string(),
    }
    .into();
    assert!(auth.is_fatal());
}

#[test]
fn test_validation_error_lists_fields() {
    let error = ApiError::Validation {
        message: "invalid payload".to_string(),
        fields: vec!["name".to_string()],
    };
    assert_eq!(
        error.to_string(),
        "Validation failed: invalid payload (fields: name)"
    );
    assert_eq!(error.fields(), ["name".to_string()]);
}

#[test]
fn test_only_timeouts_and_connection_failures_are_transient() {
    let url = "http://x".to_string();
    assert!(NetworkError::Timeout { url: url.clone() }.is_transient());
    assert!(
        NetworkError::Connection {
            url: url.clone(),
            reason: "reset".to_string()
        }
        .is_transient()
    );
    assert!(
        !NetworkError::Transport {
            url,
            reason: "bad body".to_string()
        }
        .is_transient()
    );
}
