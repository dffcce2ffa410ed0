#![allow(clippy::unwrap_used)]
// Integration tests for `VariantResolver` against a wiremock server.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use velis_api::{Credentials, Variant, VelisClient};
use velis_core::cache::CACHE_FILE_NAME;
use velis_core::{CoreError, TRUSTED_SCORE, VariantCache, VariantResolver};

const PLANT: &str = "F0AD4E0123";

// ── Helpers ─────────────────────────────────────────────────────────

struct Harness {
    server: MockServer,
    resolver: VariantResolver,
    cache: Arc<VariantCache>,
    _dir: TempDir,
}

async fn setup() -> Harness {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/accounts/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok" })))
        .mount(&server)
        .await;

    let base_url = Url::parse(&format!("{}/api/v2/", server.uri())).unwrap();
    let client = Arc::new(VelisClient::with_client(reqwest::Client::new(), base_url));
    client.login(&Credentials::new("user", "pw")).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(VariantCache::load(dir.path().join(CACHE_FILE_NAME)));
    let resolver = VariantResolver::new(client, Arc::clone(&cache));
    Harness {
        server,
        resolver,
        cache,
        _dir: dir,
    }
}

fn variant_path(variant: Variant) -> String {
    format!("/api/v2/velis/{variant}/{PLANT}")
}

async fn mount_body(server: &MockServer, variant: Variant, body: Value) {
    Mock::given(method("GET"))
        .and(path(variant_path(variant)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, variant: Variant, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(variant_path(variant)))
        .respond_with(template)
        .mount(server)
        .await;
}

// ── Scoring and selection ───────────────────────────────────────────

#[tokio::test]
async fn test_highest_score_wins() {
    let h = setup().await;

    mount_body(&h.server, Variant::Se, json!({ "on": true })).await;
    mount_body(
        &h.server,
        Variant::Med,
        json!({ "temp": 45, "reqTemp": 50, "on": true }),
    )
    .await;
    for variant in [Variant::Slp, Variant::One, Variant::Evo] {
        mount_status(&h.server, variant, ResponseTemplate::new(404)).await;
    }

    let resolution = h.resolver.resolve(PLANT).await.unwrap();
    assert_eq!(resolution.variant, Variant::Med);
    assert_eq!(resolution.score, 6);
    assert_eq!(resolution.fields.current_temp, Some(45.0));
    assert_eq!(h.cache.get(PLANT).map(|c| c.variant), Some(Variant::Med));
}

#[tokio::test]
async fn test_stale_placeholder_loses_to_power_only() {
    let h = setup().await;

    mount_body(
        &h.server,
        Variant::Se,
        json!({ "temp": 0, "procReqTemp": 0, "on": false, "avShw": 2 }),
    )
    .await;
    mount_body(&h.server, Variant::Slp, json!({ "power": true })).await;
    for variant in [Variant::Med, Variant::One, Variant::Evo] {
        mount_body(&h.server, variant, json!({})).await;
    }

    let resolution = h.resolver.resolve(PLANT).await.unwrap();
    assert_eq!(resolution.variant, Variant::Slp);
    assert_eq!(resolution.score, 1);
}

#[tokio::test]
async fn test_tie_goes_to_priority_order() {
    let h = setup().await;

    let body = json!({ "wtrTemp": 41.5, "reqTemp": 55, "on": true });
    mount_body(&h.server, Variant::One, body.clone()).await;
    mount_body(&h.server, Variant::Evo, body).await;
    for variant in [Variant::Se, Variant::Med, Variant::Slp] {
        mount_status(&h.server, variant, ResponseTemplate::new(500)).await;
    }

    let resolution = h.resolver.resolve(PLANT).await.unwrap();
    assert_eq!(resolution.variant, Variant::One);
}

// ── Cache shortcut ──────────────────────────────────────────────────

#[tokio::test]
async fn test_cached_variant_is_trusted() {
    let h = setup().await;
    h.cache.put(PLANT, Variant::Evo);

    Mock::given(method("GET"))
        .and(path(variant_path(Variant::Evo)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "on": false })))
        .expect(1)
        .mount(&h.server)
        .await;
    for variant in [Variant::Se, Variant::Med, Variant::Slp, Variant::One] {
        Mock::given(method("GET"))
            .and(path(variant_path(variant)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "on": true })))
            .expect(0)
            .mount(&h.server)
            .await;
    }

    let resolution = h.resolver.resolve(PLANT).await.unwrap();
    assert_eq!(resolution.variant, Variant::Evo);
    assert_eq!(resolution.score, TRUSTED_SCORE);
}

#[tokio::test]
async fn test_failed_cached_variant_triggers_rescan() {
    let h = setup().await;
    h.cache.put(PLANT, Variant::Se);

    mount_body(&h.server, Variant::Se, json!({})).await;
    mount_body(&h.server, Variant::Med, json!({ "temp": 50, "on": true })).await;
    for variant in [Variant::Slp, Variant::One, Variant::Evo] {
        mount_status(&h.server, variant, ResponseTemplate::new(404)).await;
    }

    let resolution = h.resolver.resolve(PLANT).await.unwrap();
    assert_eq!(resolution.variant, Variant::Med);
    assert_eq!(resolution.score, 4);
    assert_eq!(h.cache.get(PLANT).map(|c| c.variant), Some(Variant::Med));
}

#[tokio::test]
async fn test_resolve_uncached_probes_everything() {
    let h = setup().await;
    h.cache.put(PLANT, Variant::Evo);

    for variant in Variant::in_priority_order() {
        Mock::given(method("GET"))
            .and(path(variant_path(variant)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "on": true })))
            .expect(1)
            .mount(&h.server)
            .await;
    }

    let resolution = h.resolver.resolve_uncached(PLANT).await.unwrap();
    assert_eq!(resolution.variant, Variant::Se);
    assert_eq!(h.cache.get(PLANT).map(|c| c.variant), Some(Variant::Se));
}

// ── Failure aggregation ─────────────────────────────────────────────

#[tokio::test]
async fn test_rate_limited_surfaces_max_retry_after() {
    let h = setup().await;

    mount_status(
        &h.server,
        Variant::Se,
        ResponseTemplate::new(429).insert_header("Retry-After", "30"),
    )
    .await;
    mount_status(
        &h.server,
        Variant::Med,
        ResponseTemplate::new(429).insert_header("Retry-After", "120"),
    )
    .await;
    for variant in [Variant::Slp, Variant::One, Variant::Evo] {
        mount_status(&h.server, variant, ResponseTemplate::new(429)).await;
    }

    let err = h.resolver.resolve(PLANT).await.unwrap_err();
    match err {
        CoreError::RateLimited { retry_after } => {
            assert_eq!(retry_after, Some(Duration::from_secs(120)));
        }
        other => panic!("expected RateLimited, got: {other:?}"),
    }
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn test_success_beats_rate_limits() {
    let h = setup().await;

    for variant in [Variant::Se, Variant::Med, Variant::Slp, Variant::One] {
        mount_status(
            &h.server,
            variant,
            ResponseTemplate::new(429).insert_header("Retry-After", "60"),
        )
        .await;
    }
    mount_body(&h.server, Variant::Evo, json!({ "temp": 38, "on": true })).await;

    let resolution = h.resolver.resolve(PLANT).await.unwrap();
    assert_eq!(resolution.variant, Variant::Evo);
}

#[tokio::test]
async fn test_nothing_usable_is_no_data() {
    let h = setup().await;

    for variant in Variant::in_priority_order() {
        mount_body(&h.server, variant, json!({})).await;
    }

    let err = h.resolver.resolve(PLANT).await.unwrap_err();
    assert!(
        matches!(err, CoreError::NoData { ref plant_id } if plant_id == PLANT),
        "expected NoData, got: {err:?}"
    );
}

#[tokio::test]
async fn test_all_probes_rejected_is_session_expired() {
    let h = setup().await;

    for variant in Variant::in_priority_order() {
        mount_status(&h.server, variant, ResponseTemplate::new(401)).await;
    }

    let err = h.resolver.resolve(PLANT).await.unwrap_err();
    assert!(err.is_auth_expired(), "expected SessionExpired, got: {err:?}");
}
