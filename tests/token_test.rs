//! Instagram token resolution against a mocked provider.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;
use serial_test::serial;
use social_stream_importer::cache::CacheTrigger;
use social_stream_importer::config::Config;
use social_stream_importer::http::ApiClient;
use social_stream_importer::settings::{seed_from_env, ImportSettings, MemorySettings, SettingsStore};
use social_stream_importer::token::{TokenManager, TokenOutcome};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct CountingCache(AtomicUsize);

#[async_trait]
impl CacheTrigger for CountingCache {
    async fn refresh(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn test_config(server: &MockServer) -> Config {
    let mut config = Config::for_testing();
    config.instagram_api_base = server.uri();
    config.instagram_authorize_url = format!("{}/oauth/authorize/", server.uri());
    config.http_fallback_retries = 0;
    config
}

async fn resolve(server: &MockServer, store: &MemorySettings, cache: &CountingCache) -> TokenOutcome {
    let config = test_config(server);
    let api = ApiClient::from_config(&config).unwrap();
    let settings = ImportSettings::load(store).await.unwrap();
    TokenManager::new(&api, &config, store, cache)
        .resolve(&settings)
        .await
        .expect("resolve failed")
}

const PENDING_CODE: &[(&str, &str)] = &[
    ("instagram_client_id", "client"),
    ("instagram_client_secret", "secret"),
    ("instagram_code", "abc"),
];

#[tokio::test]
async fn test_exchange_stores_token_and_clears_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc"))
        .and(body_string_contains("client_secret=secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok123",
            "user": {"id": "1", "username": "jane"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemorySettings::with_values(PENDING_CODE);
    let cache = CountingCache::default();

    let outcome = resolve(&server, &store, &cache).await;
    assert_eq!(outcome, TokenOutcome::Active("tok123".to_string()));
    assert_eq!(store.get("instagram_code").await.unwrap().as_deref(), Some(""));
    assert_eq!(
        store.get("instagram_accesstoken").await.unwrap().as_deref(),
        Some("tok123")
    );
    assert_eq!(cache.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_exchange_error_mutates_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": 400,
            "error_type": "OAuthException",
            "error_message": "Matching code was not found or was already used."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemorySettings::with_values(PENDING_CODE);
    let cache = CountingCache::default();

    let outcome = resolve(&server, &store, &cache).await;
    assert_eq!(outcome, TokenOutcome::Unavailable);
    assert_eq!(store.get("instagram_code").await.unwrap().as_deref(), Some("abc"));
    assert_eq!(store.get("instagram_accesstoken").await.unwrap(), None);
    assert_eq!(cache.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_error_body_with_success_status_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 400,
            "access_token": "should-not-be-used"
        })))
        .mount(&server)
        .await;

    let store = MemorySettings::with_values(PENDING_CODE);
    let outcome = resolve(&server, &store, &CountingCache::default()).await;

    assert_eq!(outcome, TokenOutcome::Unavailable);
    assert_eq!(store.get("instagram_code").await.unwrap().as_deref(), Some("abc"));
}

#[tokio::test]
async fn test_valid_stored_token_skips_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/self"))
        .and(query_param("access_token", "stored"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "1"}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "new"})))
        .expect(0)
        .mount(&server)
        .await;

    let mut values = PENDING_CODE.to_vec();
    values.push(("instagram_accesstoken", "stored"));
    values.push(("instagram_user_id", "1"));
    let store = MemorySettings::with_values(&values);

    let outcome = resolve(&server, &store, &CountingCache::default()).await;
    assert_eq!(outcome, TokenOutcome::Active("stored".to_string()));
    assert_eq!(store.get("instagram_code").await.unwrap().as_deref(), Some("abc"));
}

#[tokio::test]
async fn test_rejected_token_without_client_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/self"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "meta": {"code": 400, "error_type": "OAuthAccessTokenException"}
        })))
        .mount(&server)
        .await;

    let store = MemorySettings::with_values(&[
        ("instagram_accesstoken", "revoked"),
        ("instagram_user_id", "1"),
    ]);

    let outcome = resolve(&server, &store, &CountingCache::default()).await;
    assert_eq!(outcome, TokenOutcome::Unavailable);
}

#[tokio::test]
async fn test_client_without_code_suspends() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth/authorize/"))
        .and(query_param("client_id", "client"))
        .and(query_param("redirect_uri", "http://localhost/callback"))
        .and(query_param("scope", "public_content"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemorySettings::with_values(&[("instagram_client_id", "client")]);
    let outcome = resolve(&server, &store, &CountingCache::default()).await;

    match outcome {
        TokenOutcome::Suspended { authorize_url } => {
            assert!(authorize_url.contains("response_type=code"));
        }
        other => panic!("expected suspension, got {other:?}"),
    }
    assert_eq!(store.get("instagram_accesstoken").await.unwrap(), None);
}

#[tokio::test]
async fn test_nothing_configured_is_unavailable() {
    let server = MockServer::start().await;
    let store = MemorySettings::new();

    let outcome = resolve(&server, &store, &CountingCache::default()).await;
    assert_eq!(outcome, TokenOutcome::Unavailable);
}

#[tokio::test]
#[serial]
async fn test_seeded_code_is_exchanged_only_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .and(body_string_contains("code=one-time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": 400,
            "error_message": "Matching code was not found or was already used."
        })))
        .expect(0)
        .mount(&server)
        .await;

    std::env::set_var("SOCIALSTREAM_INSTAGRAM_CODE", "one-time");
    let store = MemorySettings::with_values(&[
        ("instagram_client_id", "client"),
        ("instagram_client_secret", "secret"),
    ]);
    let cache = CountingCache::default();

    seed_from_env(&store).await.unwrap();
    let first = resolve(&server, &store, &cache).await;
    assert_eq!(first, TokenOutcome::Active("tok".to_string()));

    // Next start with the same environment.
    seed_from_env(&store).await.unwrap();
    assert_eq!(store.get("instagram_code").await.unwrap().as_deref(), Some(""));
    assert_eq!(store.get("instagram_accesstoken").await.unwrap().as_deref(), Some("tok"));
    let second = resolve(&server, &store, &cache).await;
    assert_eq!(second, TokenOutcome::Active("tok".to_string()));

    // A fresh code from a new redirect is still picked up.
    std::env::set_var("SOCIALSTREAM_INSTAGRAM_CODE", "second-code");
    seed_from_env(&store).await.unwrap();
    assert_eq!(
        store.get("instagram_code").await.unwrap().as_deref(),
        Some("second-code")
    );

    std::env::remove_var("SOCIALSTREAM_INSTAGRAM_CODE");
}
