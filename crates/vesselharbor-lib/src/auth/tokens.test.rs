use super::*;

#[test]
fn test_tokens_from_json_body() {
    let response = ApiResponse::new(
        200,
        r#"{"access_token": "a1", "refresh_token": "r1", "expires_in": 900}"#,
    );
    let tokens = extract_tokens(&response).unwrap().unwrap();
    assert_eq!(tokens.access_token, "a1");
    assert_eq!(tokens.refresh_token.as_deref(), Some("r1"));
    assert_eq!(tokens.expires_in, Some(900));
}

#[test]
fn test_tokens_from_data_envelope() {
    let response = ApiResponse::new(
        200,
        r#"{"status": "success", "data": {"access_token": "a2", "expires_in": "60"}}"#,
    );
    let tokens = extract_tokens(&response).unwrap().unwrap();
    assert_eq!(tokens.access_token, "a2");
    assert_eq!(tokens.refresh_token, None);
    assert_eq!(tokens.expires_in, Some(60));
}

#[test]
fn test_tokens_from_cookies() {
    let response = ApiResponse::new(200, r#"{"status": "success"}"#)
        .with_header(
            "Set-Cookie",
            "access_token=\"c-access\"; HttpOnly; Max-Age=1800; Path=/",
        )
        .with_header("Set-Cookie", "refresh_token=c-refresh; HttpOnly; Path=/");

    let tokens = extract_tokens(&response).unwrap().unwrap();
    assert_eq!(tokens.access_token, "c-access");
    assert_eq!(tokens.refresh_token.as_deref(), Some("c-refresh"));
    assert_eq!(tokens.expires_in, Some(1800));
}

#[test]
fn test_failure_status_is_reported() {
    let response = ApiResponse::new(200, r#"{"status": "error", "message": "bad password"}"#);
    assert_eq!(extract_tokens(&response).unwrap_err(), "bad password");
}

#[test]
fn test_missing_token_is_none() {
    let response = ApiResponse::new(200, r#"{"status": "success"}"#);
    assert_eq!(extract_tokens(&response).unwrap(), None);

    let empty = ApiResponse::new(204, "");
    assert_eq!(extract_tokens(&empty).unwrap(), None);
}
