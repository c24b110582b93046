use super::*;
use mockito::{Matcher, Server};

fn transport() -> ReqwestTransport {
    ReqwestTransport::new(Duration::from_secs(5)).unwrap()
}

#[test]
fn test_idempotency_of_methods() {
    assert!(Method::Get.is_idempotent());
    assert!(Method::Delete.is_idempotent());
    assert!(!Method::Post.is_idempotent());
    assert!(!Method::Put.is_idempotent());
    assert!(!Method::Patch.is_idempotent());
}

#[test]
fn test_form_encoding_escapes_reserved_characters() {
    let fields = vec![
        ("username".to_string(), "alice@example.com".to_string()),
        ("password".to_string(), "p&ss w=rd".to_string()),
    ];
    assert_eq!(
        RequestBody::encode_form(&fields),
        "username=alice%40example.com&password=p%26ss%20w%3Drd"
    );
    assert_eq!(encode_component("a/b"), "a%2Fb");
}

#[test]
fn test_debug_hides_header_values() {
    let request = ApiRequest::new(Method::Get, "http://x/organizations")
        .header("Authorization", "Bearer secret-token");
    let rendered = format!("{request:?}");
    assert!(rendered.contains("Authorization"));
    assert!(!rendered.contains("secret-token"));
    assert_eq!(request.header_value("authorization"), Some("Bearer secret-token"));
}

#[test]
fn test_response_helpers() {
    let response = ApiResponse::new(201, "")
        .with_header("Set-Cookie", "a=1")
        .with_header("set-cookie", "b=2");
    assert!(response.is_success());
    assert_eq!(response.header_values("SET-COOKIE").count(), 2);
    assert_eq!(response.json::<serde_json::Value>().unwrap(), serde_json::Value::Null);

    let broken = ApiResponse::new(200, "{not json");
    assert!(matches!(
        broken.json::<serde_json::Value>(),
        Err(ApiError::Decode { .. })
    ));
}

#[test]
fn test_reqwest_transport_sends_headers_and_json() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/organizations")
        .match_header("authorization", "Bearer abc")
        .match_body(Matcher::Json(serde_json::json!({"name": "acme"})))
        .with_status(201)
        .with_header("ETag", "\"v1\"")
        .with_body(r#"{"id": 1, "name": "acme"}"#)
        .expect(1)
        .create();

    let request = ApiRequest::new(Method::Post, format!("{}/organizations", server.url()))
        .header("Authorization", "Bearer abc")
        .json(serde_json::json!({"name": "acme"}));
    let response = transport().execute(&request).unwrap();

    mock.assert();
    assert_eq!(response.status, 201);
    assert_eq!(response.header("etag"), Some("\"v1\""));
    assert!(response.body.contains("acme"));
}

#[test]
fn test_reqwest_transport_sends_form_bodies() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/login")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("username=alice".to_string()),
            Matcher::Regex("grant_type=password".to_string()),
        ]))
        .with_status(200)
        .with_body(r#"{"status": "success"}"#)
        .create();

    let request = ApiRequest::new(Method::Post, format!("{}/login", server.url())).form(&[
        ("username", "alice"),
        ("password", "pw"),
        ("grant_type", "password"),
    ]);
    let response = transport().execute(&request).unwrap();

    mock.assert();
    assert_eq!(response.status, 200);
}

#[test]
fn test_error_statuses_are_responses_not_errors() {
    let mut server = Server::new();
    let _mock = server.mock("GET", "/missing").with_status(404).create();

    let request = ApiRequest::new(Method::Get, format!("{}/missing", server.url()));
    let response = transport().execute(&request).unwrap();
    assert_eq!(response.status, 404);
    assert!(!response.is_success());
}

#[test]
fn test_refused_connection_is_transient() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let request = ApiRequest::new(Method::Get, format!("http://127.0.0.1:{port}/organizations"));
    let error = transport().execute(&request).unwrap_err();
    assert!(error.is_transient(), "{error:?}");
}

#[test]
fn test_error_message_sources() {
    let detail = serde_json::json!({"detail": "Incorrect username or password"});
    assert_eq!(
        error_message(&detail).as_deref(),
        Some("Incorrect username or password")
    );

    let nested = serde_json::json!({"error": {"message": "nope"}});
    assert_eq!(error_message(&nested).as_deref(), Some("nope"));

    assert_eq!(error_message(&serde_json::json!({"other": 1})), None);
}

#[test]
fn test_api_error_classification() {
    let not_found = ApiResponse::new(404, r#"{"detail": "Organization not found"}"#);
    assert!(matches!(
        ApiError::from_response(&not_found),
        ApiError::NotFound { ref message } if message == "Organization not found"
    ));

    let forbidden = ApiResponse::new(403, "");
    assert!(matches!(
        ApiError::from_response(&forbidden),
        ApiError::Forbidden { ref message } if message == "the server answered 403"
    ));

    let server = ApiResponse::new(502, "Bad Gateway");
    assert!(matches!(
        ApiError::from_response(&server),
        ApiError::Server { status: 502, ref message } if message == "Bad Gateway"
    ));
}

#[test]
fn test_validation_fields_are_collected() {
    let response = ApiResponse::new(
        422,
        r#"{"detail": [
            {"loc": ["body", "name"], "msg": "field required"},
            {"loc": ["body", "name"], "msg": "too short"}
        ]}"#,
    );
    let error = ApiError::from_response(&response);
    assert_eq!(error.fields(), ["name".to_string()]);
    assert!(error.to_string().contains("field required"));

    let conflict = ApiResponse::new(
        409,
        r#"{"message": "duplicate", "errors": [{"field": "name"}], "fields": ["description"]}"#,
    );
    assert_eq!(
        ApiError::from_response(&conflict).fields(),
        ["name".to_string(), "description".to_string()]
    );
}
