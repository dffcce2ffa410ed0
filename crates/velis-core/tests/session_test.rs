#![allow(clippy::unwrap_used)]
// Integration tests for `SessionManager` against a wiremock server.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::ExposeSecret;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use velis_api::VelisClient;
use velis_core::{CoreError, Credentials, LoginRetryPolicy, SessionManager};

fn fast_policy() -> LoginRetryPolicy {
    LoginRetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(50),
    }
}

fn manager(server: &MockServer) -> SessionManager {
    let base_url = Url::parse(&format!("{}/api/v2/", server.uri())).unwrap();
    let client = Arc::new(VelisClient::with_client(reqwest::Client::new(), base_url));
    SessionManager::new(
        client,
        Credentials::new("user@example.com", "pw"),
        fast_policy(),
    )
}

#[tokio::test]
async fn test_login_returns_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/accounts/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok-123" })))
        .expect(1)
        .mount(&server)
        .await;

    let session = manager(&server);
    assert!(!session.is_authenticated());

    let token = session.login().await.unwrap();
    assert_eq!(token.expose_secret(), "tok-123");
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn test_login_with_retry_returns_token_after_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/accounts/login"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/accounts/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok-456" })))
        .mount(&server)
        .await;

    let token = manager(&server).login_with_retry().await.unwrap();
    assert_eq!(token.expose_secret(), "tok-456");
}

#[tokio::test]
async fn test_login_without_token_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/accounts/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let err = manager(&server).login().await.unwrap_err();
    assert!(
        matches!(err, CoreError::AuthenticationFailed { .. }),
        "expected AuthenticationFailed, got: {err:?}"
    );
}
