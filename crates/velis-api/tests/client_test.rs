#![allow(clippy::unwrap_used)]
// Integration tests for `VelisClient` using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use velis_api::{Credentials, Error, ProbeOutcome, Variant, VelisClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, VelisClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api/v2/", server.uri())).unwrap();
    let client = VelisClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

async fn logged_in() -> (MockServer, VelisClient) {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/accounts/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok-123" })))
        .mount(&server)
        .await;
    client.login(&Credentials::new("user@example.com", "hunter2")).await.unwrap();
    (server, client)
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_login_sends_app_identity() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/accounts/login"))
        .and(body_json(json!({
            "usr": "user@example.com",
            "pwd": "hunter2",
            "imp": false,
            "notTrack": true,
            "appInfo": { "os": 2, "appVer": "5.6.7772.40151", "appId": "com.remotethermo.aristonnet" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok-123" })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(!client.is_authenticated());
    client
        .login(&Credentials::new("user@example.com", "hunter2"))
        .await
        .unwrap();
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn test_login_failure_status() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/accounts/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.login(&Credentials::new("user", "wrong")).await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn test_login_without_token_fails() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/accounts/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let result = client.login(&Credentials::new("user", "pw")).await;
    match result {
        Err(Error::Authentication { ref message }) => {
            assert!(message.contains("no token"), "unexpected message: {message}");
        }
        other => panic!("expected Authentication error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_probe_requires_login() {
    let (_server, client) = setup().await;
    let result = client.probe(Variant::Se, "PLANT1").await;
    assert!(matches!(result, Err(Error::NotAuthenticated)));
}

// ── Probe tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_probe_usable_body() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/velis/medPlantData/PLANT1"))
        .and(header("ar.authToken", "tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "wtrTemp": 46.5,
            "reqTemp": 55,
            "power": true,
            "avShw": 3
        })))
        .mount(&server)
        .await;

    let outcome = client.probe(Variant::Med, "PLANT1").await.unwrap();
    let ProbeOutcome::Usable(data) = outcome else {
        panic!("expected usable body, got {outcome:?}");
    };
    assert_eq!(data.variant, Variant::Med);
    assert_eq!(data.fields.current_temp, Some(46.5));
    assert_eq!(data.fields.target_temp, Some(55.0));
    assert_eq!(data.fields.power_state, Some(true));
    assert_eq!(data.fields.av_shw, Some(3.0));
    assert_eq!(data.raw.get("power"), Some(&json!(true)));
}

#[tokio::test]
async fn test_probe_encodes_plant_id() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/velis/sePlantData/A%20B"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "temp": 40 })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client.probe(Variant::Se, "A B").await.unwrap();
    assert!(matches!(outcome, ProbeOutcome::Usable(_)));
}

#[tokio::test]
async fn test_probe_empty_body_is_unusable() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/velis/slpPlantData/PLANT1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/velis/onePlantData/PLANT1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert_eq!(
        client.probe(Variant::Slp, "PLANT1").await.unwrap(),
        ProbeOutcome::Unusable { status: 200 }
    );
    assert_eq!(
        client.probe(Variant::One, "PLANT1").await.unwrap(),
        ProbeOutcome::Unusable { status: 404 }
    );
}

#[tokio::test]
async fn test_probe_rate_limited_with_retry_after() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/velis/evoPlantData/PLANT1"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "42"))
        .mount(&server)
        .await;

    let result = client.probe(Variant::Evo, "PLANT1").await;
    match result {
        Err(Error::RateLimited { retry_after }) => {
            assert_eq!(retry_after, Some(Duration::from_secs(42)));
        }
        other => panic!("expected RateLimited, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_probe_rate_limited_without_retry_after() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/velis/sePlantData/PLANT1"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let result = client.probe(Variant::Se, "PLANT1").await;
    assert!(matches!(result, Err(Error::RateLimited { retry_after: None })));
}

#[tokio::test]
async fn test_probe_session_expired() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/velis/sePlantData/PLANT1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.probe(Variant::Se, "PLANT1").await;
    assert!(matches!(result, Err(Error::SessionExpired)));
}

// ── Device listing tests ────────────────────────────────────────────

#[tokio::test]
async fn test_list_plants_falls_back_to_second_path() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/velis/medPlants"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/velis/plants"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "gw": "F0AD4E0123", "name": "Velis" }])),
        )
        .mount(&server)
        .await;

    let plants = client.list_plants().await.unwrap();
    assert_eq!(plants.len(), 1);
    assert_eq!(
        velis_api::plant_identifier(&plants[0]).as_deref(),
        Some("F0AD4E0123")
    );
}

#[tokio::test]
async fn test_list_plants_empty_account() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(client.list_plants().await.unwrap().is_empty());
}

// ── Write tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_set_temperature_body() {
    let (server, client) = logged_in().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/velis/sePlantData/PLANT1/temperature"))
        .and(header("ar.authToken", "tok-123"))
        .and(body_json(json!({ "eco": false, "old": 50, "new": 55 })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client
        .set_temperature(Variant::Se, "PLANT1", 50.0, 55.0)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_set_power_sends_bare_bool() {
    let (server, client) = logged_in().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/velis/medPlantData/PLANT1/switch"))
        .and(body_json(json!(false)))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.set_power(Variant::Med, "PLANT1", false).await.unwrap();
}

#[tokio::test]
async fn test_write_failure_status() {
    let (server, client) = logged_in().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/velis/sePlantData/PLANT1/switch"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = client.set_power(Variant::Se, "PLANT1", true).await;
    match result {
        Err(Error::Status { status, ref operation }) => {
            assert_eq!(status, 500);
            assert_eq!(operation, "Set power");
        }
        other => panic!("expected Status error, got: {other:?}"),
    }
}
