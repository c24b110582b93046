use super::*;
use crate::application::config::{Settings, SettingsLayer};
use crate::application::session_mocks::*;
use crate::display::DisplayCall;
use crate::networking::Method;
use crate::primitives::{ExitStatus, NetworkError};

const NOW: u64 = 1_000_000;
const TOKENS: &str = r#"{"access_token": "access-1", "refresh_token": "refresh-1", "expires_in": 3600}"#;

fn stored_session() -> Credentials {
    Credentials {
        mode: CredentialMode::Password,
        api_url: MockCommandSession::API_URL.to_string(),
        access_token: "access-1".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: Some(NOW + 3600),
        raw_api_key: None,
    }
}

fn logged_in() -> MockCommandSession {
    MockCommandSession::new().with_credentials(MemoryCredentialStore::with(stored_session()))
}

fn settings_with(update: impl FnOnce(&mut Settings)) -> Settings {
    let mut settings = Settings {
        api_url: MockCommandSession::API_URL.to_string(),
        ..Settings::default()
    };
    update(&mut settings);
    settings
}

fn run(session: &MockCommandSession, command: Commands) -> Result<()> {
    execute_command_with_session(&command, session)
}

fn exit_status(result: Result<()>) -> ExitStatus {
    match result {
        Ok(()) => ExitStatus::Success,
        Err(e) => ExitStatus::from_error(&e),
    }
}

fn auth(command: AuthCommands) -> Commands {
    Commands::Auth { command }
}

fn config(command: ConfigCommands) -> Commands {
    Commands::Config { command }
}

fn org(command: ResourceCommands) -> Commands {
    Commands::Org { command }
}

fn env(org: &str, command: ResourceCommands) -> Commands {
    Commands::Environment {
        org: org.to_string(),
        command,
    }
}

// ===== AUTH LOGIN TESTS =====

mod auth_login_tests {
    use super::*;

    #[test]
    fn it_logs_in_with_configured_credentials() {
        let session = MockCommandSession::new()
            .with_settings(settings_with(|s| {
                s.username = "alice".to_string();
                s.password = "secret".to_string();
            }))
            .with_transport(MockTransport::new().respond(Method::Post, "/login", 200, TOKENS));

        run(&session, auth(AuthCommands::Login)).unwrap();

        let stored = session.credential_store.current().unwrap();
        assert_eq!(stored.access_token, "access-1");
        assert_eq!(stored.expires_at, Some(NOW + 3600));
        assert!(session.interactive_provider.get_text_input_calls().is_empty());
        assert!(session.display_provider.transcript().contains("Logged in as alice"));
    }

    #[test]
    fn it_prompts_for_missing_username_and_password() {
        let session = MockCommandSession::new()
            .with_interactive(
                MockInteractiveProvider::new()
                    .with_text_input("bob")
                    .with_password("hunter2"),
            )
            .with_transport(MockTransport::new().respond(Method::Post, "/login", 200, TOKENS));

        run(&session, auth(AuthCommands::Login)).unwrap();

        assert_eq!(session.interactive_provider.get_text_input_calls()[0].0, "Username");
        assert_eq!(session.interactive_provider.get_password_calls(), vec!["Password"]);
        let fields = match &session.transport.requests()[0].body {
            Some(crate::networking::RequestBody::Form(fields)) => fields.clone(),
            other => panic!("expected a form body, got {other:?}"),
        };
        assert!(fields.contains(&("username".to_string(), "bob".to_string())));
        assert!(fields.contains(&("password".to_string(), "hunter2".to_string())));
    }

    #[test]
    fn it_fails_without_username_when_not_interactive() {
        let session = MockCommandSession::new()
            .with_interactive(MockInteractiveProvider::new().non_interactive());

        let result = run(&session, auth(AuthCommands::Login));

        assert_eq!(exit_status(result), ExitStatus::Config);
        assert!(session.transport.requests().is_empty());
    }

    #[test]
    fn it_reports_rejected_login_as_auth_error() {
        let session = MockCommandSession::new()
            .with_settings(settings_with(|s| {
                s.username = "alice".to_string();
                s.password = "wrong".to_string();
            }))
            .with_transport(MockTransport::new().respond(
                Method::Post,
                "/login",
                401,
                r#"{"detail": "bad credentials"}"#,
            ));

        let result = run(&session, auth(AuthCommands::Login));

        assert_eq!(exit_status(result), ExitStatus::Auth);
        assert!(session.credential_store.current().is_none());
    }
}

// ===== AUTH LOGIN-KEY TESTS =====

mod auth_login_key_tests {
    use super::*;

    #[test]
    fn it_stores_an_accepted_key() {
        let session = MockCommandSession::new()
            .with_transport(MockTransport::new().respond(Method::Post, "/login", 200, "{}"));

        run(
            &session,
            auth(AuthCommands::LoginKey {
                key: Some("key-123".to_string()),
            }),
        )
        .unwrap();

        let stored = session.credential_store.current().unwrap();
        assert_eq!(stored.mode, CredentialMode::ApiKey);
        assert_eq!(stored.raw_api_key.as_deref(), Some("key-123"));
        assert_eq!(
            session.transport.requests()[0].header_value("x-api-key"),
            Some("key-123")
        );
    }

    #[test]
    fn it_falls_back_to_configured_key() {
        let session = MockCommandSession::new()
            .with_settings(settings_with(|s| s.api_key = "from-env".to_string()))
            .with_transport(MockTransport::new().respond(Method::Post, "/login", 200, "{}"));

        run(&session, auth(AuthCommands::LoginKey { key: None })).unwrap();
        assert_eq!(
            session.credential_store.current().unwrap().raw_api_key.as_deref(),
            Some("from-env")
        );
    }

    #[test]
    fn it_requires_a_key() {
        let session = MockCommandSession::new();
        let result = run(&session, auth(AuthCommands::LoginKey { key: None }));
        assert_eq!(exit_status(result), ExitStatus::Config);
    }

    #[test]
    fn it_rejects_a_refused_key() {
        let session = MockCommandSession::new()
            .with_transport(MockTransport::new().respond(Method::Post, "/login", 403, ""));

        let result = run(
            &session,
            auth(AuthCommands::LoginKey {
                key: Some("revoked".to_string()),
            }),
        );

        assert_eq!(exit_status(result), ExitStatus::Auth);
        assert!(session.credential_store.current().is_none());
    }
}

// ===== AUTH LOGOUT / STATUS TESTS =====

mod auth_session_tests {
    use super::*;

    #[test]
    fn logout_clears_the_store() {
        let session = logged_in();

        run(&session, auth(AuthCommands::Logout)).unwrap();

        assert!(session.credential_store.current().is_none());
        assert!(session
            .display_provider
            .has_call(&DisplayCall::Success("Logged out".to_string())));
    }

    #[test]
    fn logout_is_idempotent() {
        let session = MockCommandSession::new();
        run(&session, auth(AuthCommands::Logout)).unwrap();
        run(&session, auth(AuthCommands::Logout)).unwrap();
    }

    #[test]
    fn logout_warns_when_the_store_cannot_be_cleared() {
        let session = MockCommandSession::new().with_credentials(
            MemoryCredentialStore::with(stored_session()).failing_writes(),
        );

        run(&session, auth(AuthCommands::Logout)).unwrap();

        assert!(session.credential_store.current().is_some());
        assert!(!session
            .display_provider
            .has_call(&DisplayCall::Success("Logged out".to_string())));
        let warnings: Vec<_> = session
            .display_provider
            .get_calls()
            .into_iter()
            .filter_map(|call| match call {
                DisplayCall::Warning(message) => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("could not be removed"), "{warnings:?}");
    }

    #[test]
    fn logout_ignores_an_invalid_port() {
        let session = logged_in().with_settings(settings_with(|s| s.server_port = "abc".to_string()));

        run(&session, auth(AuthCommands::Logout)).unwrap();

        assert!(session.credential_store.current().is_none());
    }

    #[test]
    fn status_reports_signed_out() {
        let session = MockCommandSession::new();

        run(&session, auth(AuthCommands::Status)).unwrap();

        assert!(session
            .display_provider
            .has_call(&DisplayCall::Warning("Not logged in".to_string())));
        assert!(session.transport.requests().is_empty());
    }

    #[test]
    fn status_describes_stored_session_without_refreshing() {
        let session = logged_in();

        run(&session, auth(AuthCommands::Status)).unwrap();

        assert!(session
            .display_provider
            .has_call(&DisplayCall::Success("Authenticated".to_string())));
        let transcript = session.display_provider.transcript();
        assert!(transcript.contains("Mode: password"));
        assert!(transcript.contains("Expires: in 3600s"));
        assert!(transcript.contains("Refreshable: yes"));
        assert!(session.transport.requests().is_empty());
    }

    #[test]
    fn status_after_logout_is_signed_out() {
        let session = logged_in();

        run(&session, auth(AuthCommands::Logout)).unwrap();
        run(&session, auth(AuthCommands::Status)).unwrap();

        assert!(session
            .display_provider
            .has_call(&DisplayCall::Warning("Not logged in".to_string())));
    }

    #[test]
    fn status_flags_a_session_for_another_server() {
        let mut credentials = stored_session();
        credentials.api_url = "http://elsewhere:1".to_string();
        let session =
            MockCommandSession::new().with_credentials(MemoryCredentialStore::with(credentials));

        run(&session, auth(AuthCommands::Status)).unwrap();

        let transcript = session.display_provider.transcript();
        assert!(transcript.contains("Not logged in"));
        assert!(transcript.contains("belongs to http://elsewhere:1"));
    }
}

// ===== CONFIG TESTS =====

mod config_tests {
    use super::*;

    #[test]
    fn set_url_persists_to_config_file() {
        let mut session = MockCommandSession::new();

        run(
            &session,
            config(ConfigCommands::SetUrl {
                url: "https://api.example.com".to_string(),
            }),
        )
        .unwrap();

        session.reload(&SettingsLayer::default());
        assert_eq!(session.settings.api_url, "https://api.example.com");
        let contents = std::fs::read_to_string(session.paths.config_file()).unwrap();
        assert!(contents.contains("api_url"));
    }

    #[test]
    fn server_and_port_compose_the_url() {
        let mut session = MockCommandSession::new();

        run(
            &session,
            config(ConfigCommands::SetServer {
                server_name: "harbor.internal".to_string(),
            }),
        )
        .unwrap();
        run(
            &session,
            config(ConfigCommands::SetPort {
                port: "9000".to_string(),
            }),
        )
        .unwrap();

        session.reload(&SettingsLayer::default());
        assert_eq!(session.settings.api_url, "http://harbor.internal:9000");
    }

    #[test]
    fn set_url_warns_when_server_and_port_take_precedence() {
        let session = MockCommandSession::new();
        session
            .paths
            .update_file_layer(|layer| {
                layer.server_name = Some("h".to_string());
                layer.server_port = Some("9".to_string());
            })
            .unwrap();

        run(
            &session,
            config(ConfigCommands::SetUrl {
                url: "http://other:1".to_string(),
            }),
        )
        .unwrap();

        assert!(session
            .display_provider
            .transcript()
            .contains("take precedence"));
    }

    #[test]
    fn set_port_rejects_invalid_values() {
        let session = MockCommandSession::new();

        for port in ["abc", "0", "70000"] {
            let result = run(
                &session,
                config(ConfigCommands::SetPort {
                    port: port.to_string(),
                }),
            );
            assert_eq!(exit_status(result), ExitStatus::Config, "port {port}");
        }
        assert!(!session.paths.config_file().exists());
    }

    #[test]
    fn set_url_rejects_blank() {
        let session = MockCommandSession::new();
        let result = run(
            &session,
            config(ConfigCommands::SetUrl {
                url: "  ".to_string(),
            }),
        );
        assert_eq!(exit_status(result), ExitStatus::Config);
    }

    #[test]
    fn set_commands_never_write_credentials() {
        let session = MockCommandSession::new().with_settings(settings_with(|s| {
            s.password = "secret".to_string();
            s.api_key = "key".to_string();
        }));

        run(
            &session,
            config(ConfigCommands::SetServer {
                server_name: "h".to_string(),
            }),
        )
        .unwrap();

        let contents = std::fs::read_to_string(session.paths.config_file()).unwrap();
        assert!(!contents.contains("secret"));
        assert!(!contents.contains("api_key"));
    }

    #[test]
    fn get_commands_print_effective_values() {
        let session = MockCommandSession::new().with_settings(settings_with(|s| {
            s.server_name = "h".to_string();
            s.server_port = "9".to_string();
        }));

        run(&session, config(ConfigCommands::GetUrl)).unwrap();
        run(&session, config(ConfigCommands::GetServer)).unwrap();
        run(&session, config(ConfigCommands::GetPort)).unwrap();

        assert_eq!(
            session.display_provider.messages(),
            vec![MockCommandSession::API_URL.to_string(), "h".to_string(), "9".to_string()]
        );
    }
}

// ===== ORGANIZATION TESTS =====

mod org_tests {
    use super::*;

    #[test]
    fn invalid_port_stops_the_command_before_any_request() {
        let session = logged_in().with_settings(settings_with(|s| s.server_port = "abc".to_string()));

        let result = run(&session, org(ResourceCommands::List));

        assert_eq!(exit_status(result), ExitStatus::Config);
        assert!(session.transport.requests().is_empty());
    }

    #[test]
    fn list_prints_count_and_items() {
        let session = logged_in().with_transport(MockTransport::new().respond(
            Method::Get,
            "/organizations",
            200,
            r#"{"data": [{"id": 1, "name": "acme"}, {"id": 2, "name": "globex"}]}"#,
        ));

        run(&session, org(ResourceCommands::List)).unwrap();

        assert!(session
            .display_provider
            .has_call(&DisplayCall::Section("Organizations (2):".to_string())));
        assert_eq!(
            session.display_provider.messages(),
            vec!["  1: acme".to_string(), "  2: globex".to_string()]
        );
        assert_eq!(
            session.transport.requests()[0].header_value("authorization"),
            Some("Bearer access-1")
        );
    }

    #[test]
    fn list_without_any_credentials_is_a_config_error() {
        let session = MockCommandSession::new();

        let result = run(&session, org(ResourceCommands::List));

        assert_eq!(exit_status(result), ExitStatus::Config);
        assert!(session.transport.requests().is_empty());
    }

    #[test]
    fn list_logs_in_implicitly_from_settings() {
        let session = MockCommandSession::new()
            .with_settings(settings_with(|s| {
                s.username = "alice".to_string();
                s.password = "secret".to_string();
            }))
            .with_transport(
                MockTransport::new()
                    .respond(Method::Post, "/login", 200, TOKENS)
                    .respond(Method::Get, "/organizations", 200, "[]"),
            );

        run(&session, org(ResourceCommands::List)).unwrap();

        assert_eq!(session.transport.count(Method::Post, "/login"), 1);
        assert!(session.credential_store.current().is_some());
        assert!(session
            .display_provider
            .has_call(&DisplayCall::Section("Organizations (0):".to_string())));
    }

    #[test]
    fn username_without_password_needs_login() {
        let session = MockCommandSession::new()
            .with_settings(settings_with(|s| s.username = "alice".to_string()));

        let result = run(&session, org(ResourceCommands::List));

        assert_eq!(exit_status(result), ExitStatus::Auth);
        assert!(session.transport.requests().is_empty());
    }

    #[test]
    fn expired_session_is_refreshed_before_listing() {
        let mut credentials = stored_session();
        credentials.expires_at = Some(NOW + 5);
        let session = MockCommandSession::new()
            .with_credentials(MemoryCredentialStore::with(credentials))
            .with_transport(
                MockTransport::new()
                    .respond(
                        Method::Post,
                        "/refresh-token",
                        200,
                        r#"{"access_token": "access-2", "expires_in": 3600}"#,
                    )
                    .respond(Method::Get, "/organizations", 200, "[]"),
            );

        run(&session, org(ResourceCommands::List)).unwrap();

        let list = &session.transport.requests_to(Method::Get, "/organizations")[0];
        assert_eq!(list.header_value("authorization"), Some("Bearer access-2"));
        assert_eq!(
            session.credential_store.current().unwrap().access_token,
            "access-2"
        );
    }

    #[test]
    fn get_shows_detail_block() {
        let session = logged_in().with_transport(MockTransport::new().respond(
            Method::Get,
            "/organizations/1",
            200,
            r#"{"id": 1, "name": "acme", "description": "roadrunner traps"}"#,
        ));

        run(
            &session,
            org(ResourceCommands::Get {
                id: "1".to_string(),
            }),
        )
        .unwrap();

        let transcript = session.display_provider.transcript();
        assert!(transcript.contains("ID: 1"));
        assert!(transcript.contains("Name: acme"));
        assert!(transcript.contains("Description: roadrunner traps"));
    }

    #[test]
    fn get_unknown_id_is_an_api_error() {
        let session = logged_in().with_transport(MockTransport::new().respond(
            Method::Get,
            "/organizations/9",
            404,
            r#"{"detail": "organization 9 does not exist"}"#,
        ));

        let err = run(
            &session,
            org(ResourceCommands::Get {
                id: "9".to_string(),
            }),
        )
        .unwrap_err();

        assert_eq!(ExitStatus::from_error(&err), ExitStatus::Api);
        assert!(format!("{err:#}").contains("organization 9 does not exist"));
    }

    #[test]
    fn create_requires_a_name() {
        let session = logged_in();

        let result = run(
            &session,
            org(ResourceCommands::Create {
                name: " ".to_string(),
                description: None,
            }),
        );

        assert!(result.unwrap_err().to_string().contains("Required: name"));
        assert!(session.transport.requests().is_empty());
    }

    #[test]
    fn create_posts_fields_and_reports() {
        let session = logged_in().with_transport(MockTransport::new().respond(
            Method::Post,
            "/organizations",
            201,
            r#"{"data": {"id": 5, "name": "initech"}}"#,
        ));

        run(
            &session,
            org(ResourceCommands::Create {
                name: "initech".to_string(),
                description: Some("tps reports".to_string()),
            }),
        )
        .unwrap();

        assert!(session
            .display_provider
            .has_call(&DisplayCall::Success("Created organization 'initech'".to_string())));
        let request = &session.transport.requests_to(Method::Post, "/organizations")[0];
        match &request.body {
            Some(crate::networking::RequestBody::Json(body)) => {
                assert_eq!(body["name"], "initech");
                assert_eq!(body["description"], "tps reports");
            }
            other => panic!("expected a json body, got {other:?}"),
        }
    }

    #[test]
    fn create_validation_error_keeps_field_names() {
        let session = logged_in().with_transport(MockTransport::new().respond(
            Method::Post,
            "/organizations",
            422,
            r#"{"detail": "name taken", "errors": [{"field": "name"}]}"#,
        ));

        let err = run(
            &session,
            org(ResourceCommands::Create {
                name: "acme".to_string(),
                description: None,
            }),
        )
        .unwrap_err();

        assert_eq!(ExitStatus::from_error(&err), ExitStatus::Api);
        assert!(format!("{err:#}").contains("fields: name"));
    }

    #[test]
    fn update_with_no_changes_sends_nothing() {
        let session = logged_in();

        run(
            &session,
            org(ResourceCommands::Update {
                id: "1".to_string(),
                name: None,
                description: None,
            }),
        )
        .unwrap();

        assert!(session.transport.requests().is_empty());
        assert!(session.display_provider.transcript().contains("Nothing to update"));
    }

    #[test]
    fn update_puts_changed_fields() {
        let session = logged_in().with_transport(MockTransport::new().respond(
            Method::Put,
            "/organizations/1",
            200,
            r#"{"id": "1", "name": "acme corp"}"#,
        ));

        run(
            &session,
            org(ResourceCommands::Update {
                id: "1".to_string(),
                name: Some("acme corp".to_string()),
                description: None,
            }),
        )
        .unwrap();

        assert!(session
            .display_provider
            .has_call(&DisplayCall::Success("Updated organization 'acme corp'".to_string())));
    }

    #[test]
    fn network_failure_maps_to_network_exit() {
        let timeout = || NetworkError::Timeout {
            url: format!("{}/organizations", MockCommandSession::API_URL),
        };
        let session = logged_in().with_transport(
            MockTransport::new()
                .fail(Method::Get, "/organizations", timeout())
                .fail(Method::Get, "/organizations", timeout()),
        );

        let result = run(&session, org(ResourceCommands::List));

        assert_eq!(exit_status(result), ExitStatus::Network);
        assert_eq!(session.transport.count(Method::Get, "/organizations"), 2);
    }
}

// ===== ENVIRONMENT TESTS =====

mod environment_tests {
    use super::*;

    #[test]
    fn list_is_scoped_to_the_organization() {
        let session = logged_in().with_transport(MockTransport::new().respond(
            Method::Get,
            "/organizations/7/environments",
            200,
            r#"[{"id": 3, "name": "staging"}]"#,
        ));

        run(&session, env("7", ResourceCommands::List)).unwrap();

        assert!(session
            .display_provider
            .has_call(&DisplayCall::Section("Environments (1):".to_string())));
        assert_eq!(session.display_provider.messages(), vec!["  3: staging".to_string()]);
    }

    #[test]
    fn delete_reports_success() {
        let session = logged_in().with_transport(MockTransport::new().respond(
            Method::Delete,
            "/organizations/7/environments/3",
            204,
            "",
        ));

        run(
            &session,
            env(
                "7",
                ResourceCommands::Delete {
                    id: "3".to_string(),
                },
            ),
        )
        .unwrap();

        assert!(session
            .display_provider
            .has_call(&DisplayCall::Success("Deleted environment 3".to_string())));
    }

    #[test]
    fn blank_organization_is_rejected_locally() {
        let session = logged_in();

        let result = run(&session, env(" ", ResourceCommands::List));

        assert_eq!(exit_status(result), ExitStatus::Api);
        assert!(session.transport.requests().is_empty());
    }
}

// ===== INTERACTIVE TESTS =====

mod interactive_tests {
    use super::*;

    #[test]
    fn it_refuses_to_start_without_a_terminal() {
        let session = logged_in()
            .with_interactive(MockInteractiveProvider::new().non_interactive());

        let result = run(&session, Commands::Interactive);

        assert_eq!(exit_status(result), ExitStatus::Config);
        assert!(session.transport.requests().is_empty());
    }

    #[test]
    fn it_quits_from_the_main_menu() {
        let session = logged_in().with_interactive(MockInteractiveProvider::new().with_select(2));

        run(&session, Commands::Interactive).unwrap();

        assert!(session.transport.requests().is_empty());
    }

    #[test]
    fn it_browses_organizations_over_http() {
        let session = logged_in()
            .with_interactive(MockInteractiveProvider::new().with_selects(&[0, 0, 4]))
            .with_transport(MockTransport::new().respond(
                Method::Get,
                "/organizations",
                200,
                r#"[{"id": 1, "name": "acme"}]"#,
            ));

        run(&session, Commands::Interactive).unwrap();

        assert!(session
            .display_provider
            .has_call(&DisplayCall::Section("Organizations (1):".to_string())));
    }

    #[test]
    fn session_loss_ends_with_auth_status() {
        let mut credentials = stored_session();
        credentials.expires_at = Some(NOW + 5);
        let session = MockCommandSession::new()
            .with_credentials(MemoryCredentialStore::with(credentials))
            .with_interactive(MockInteractiveProvider::new().with_selects(&[0, 0]))
            .with_transport(
                MockTransport::new()
                    .respond(
                        Method::Post,
                        "/refresh-token",
                        200,
                        r#"{"access_token": "access-2", "expires_in": 3600}"#,
                    )
                    .respond(Method::Get, "/organizations", 401, "")
                    .respond(Method::Post, "/refresh-token", 401, ""),
            );

        let result = run(&session, Commands::Interactive);

        assert_eq!(exit_status(result), ExitStatus::Auth);
        assert!(session.credential_store.current().is_none());
    }
}
