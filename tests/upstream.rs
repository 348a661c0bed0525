//! Transport and assistant-model tests against local mock upstreams.

use axum::{
    extract::Query,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;

use macfreeapps::assistant::{ConversationContext, ConversationModel, DeepSeekModel};
use macfreeapps::config::{AssistantConfig, FetchConfig};
use macfreeapps::transport::jsonp::JsonpTransport;
use macfreeapps::transport::lookup::LookupTransport;
use macfreeapps::transport::scrape::ScrapeTransport;
use macfreeapps::transport::{FetchChain, Transport, TransportError};

const LISTING_URL: &str = "https://apps.apple.com/tr/app/canva/id897446215";

const LISTING_PAGE: &str = r#"<html><body>
  <h1 class="product-header__title">Canva</h1>
  <section class="product-description"><p>Design anything and publish anywhere with ease.</p></section>
  <span class="category">Graphics &amp; Design</span>
</body></html>"#;

fn canva() -> Value {
    json!({
        "trackId": 897446215u64,
        "trackName": "Canva",
        "description": "Design anything.",
        "primaryGenreName": "Graphics & Design",
        "artistName": "Canva",
        "price": 0.0,
        "fileSizeBytes": "1048576"
    })
}

async fn lookup(Query(q): Query<HashMap<String, String>>) -> impl IntoResponse {
    let id = q.get("id").cloned().unwrap_or_default();
    let results = if id == "897446215" { vec![canva()] } else { vec![] };
    let body = json!({ "resultCount": results.len(), "results": results });
    match q.get("callback") {
        Some(cb) => format!("/**/{}({});", cb, body).into_response(),
        None => Json(body).into_response(),
    }
}

async fn search(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    let results = if q.get("term").map(String::as_str) == Some("Canva") {
        vec![canva()]
    } else {
        vec![]
    };
    Json(json!({ "resultCount": results.len(), "results": results }))
}

/// Fails plain lookups, answers padded ones.
async fn jsonp_only(Query(q): Query<HashMap<String, String>>) -> impl IntoResponse {
    match q.get("callback") {
        Some(cb) => format!("{}({{\"results\":[{}]}})", cb, canva()).into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn relay(Query(q): Query<HashMap<String, String>>) -> impl IntoResponse {
    if q.get("url").map(String::as_str) == Some(LISTING_URL) {
        Html(LISTING_PAGE).into_response()
    } else {
        StatusCode::BAD_REQUEST.into_response()
    }
}

async fn broken_relay() -> StatusCode {
    StatusCode::BAD_GATEWAY
}

async fn completion() -> Json<Value> {
    Json(json!({ "choices": [{ "message": { "role": "assistant", "content": "Merhaba!" } }] }))
}

async fn unauthorized() -> StatusCode {
    StatusCode::UNAUTHORIZED
}

/// Serve the mock upstream on an ephemeral port; returns its base URL.
async fn start_upstream() -> String {
    let app = Router::new()
        .route("/lookup", get(lookup))
        .route("/search", get(search))
        .route("/jsonp-only", get(jsonp_only))
        .route("/relay", get(relay))
        .route("/broken", get(broken_relay))
        .route("/chat", post(completion))
        .route("/chat-denied", post(unauthorized));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}", addr)
}

fn fetch_config(base: &str) -> FetchConfig {
    FetchConfig {
        lookup_url: format!("{}/lookup", base),
        search_url: format!("{}/search", base),
        cors_proxies: vec![],
        timeout_secs: 5,
        jsonp_timeout_secs: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_lookup_found_and_not_found() {
    let base = start_upstream().await;
    let transport = LookupTransport::from_config(&fetch_config(&base)).unwrap();

    let raw = transport.fetch(LISTING_URL).await.unwrap();
    assert_eq!(raw.name.as_deref(), Some("Canva"));
    assert_eq!(raw.file_size_bytes, Some(1_048_576));

    let err = transport
        .fetch("https://apps.apple.com/tr/app/other/id1")
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::NotFound));

    let err = transport.fetch("https://example.com/app").await.unwrap_err();
    assert!(matches!(err, TransportError::MissingAppId(_)));
}

#[tokio::test]
async fn test_search_app_builds_listing_url() {
    let base = start_upstream().await;
    let transport = LookupTransport::from_config(&fetch_config(&base)).unwrap();

    let hit = transport.search_app("Canva").await.unwrap().unwrap();
    assert_eq!(hit.url, "https://apps.apple.com/tr/app/id897446215");
    assert_eq!(hit.raw.developer.as_deref(), Some("Canva"));

    assert!(transport.search_app("Nothing Here").await.unwrap().is_none());
}

#[tokio::test]
async fn test_jsonp_unwraps_padding_and_releases_callback() {
    let base = start_upstream().await;
    let transport = JsonpTransport::from_config(&fetch_config(&base)).unwrap();

    let raw = transport.fetch(LISTING_URL).await.unwrap();
    assert_eq!(raw.genre.as_deref(), Some("Graphics & Design"));
    assert_eq!(transport.pending_count(), 0);

    let err = transport
        .fetch("https://apps.apple.com/tr/app/other/id1")
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::NotFound));
    assert_eq!(transport.pending_count(), 0);
}

#[tokio::test]
async fn test_scrape_falls_through_relays() {
    let base = start_upstream().await;
    let mut cfg = fetch_config(&base);
    cfg.cors_proxies = vec![format!("{}/broken?url=", base), format!("{}/relay?url=", base)];
    let transport = ScrapeTransport::from_config(&cfg).unwrap();

    let raw = transport.fetch(LISTING_URL).await.unwrap();
    assert_eq!(raw.name.as_deref(), Some("Canva"));
    assert_eq!(raw.genre.as_deref(), Some("Graphics & Design"));

    cfg.cors_proxies = vec![format!("{}/broken?url=", base)];
    let transport = ScrapeTransport::from_config(&cfg).unwrap();
    let err = transport.fetch(LISTING_URL).await.unwrap_err();
    assert!(matches!(err, TransportError::Status { status: 502, .. }));
}

#[tokio::test]
async fn test_chain_falls_back_to_jsonp() {
    let base = start_upstream().await;
    let mut cfg = fetch_config(&base);
    cfg.lookup_url = format!("{}/jsonp-only", base);
    cfg.strategies = vec!["lookup".into(), "jsonp".into()];
    let chain = FetchChain::from_config(&cfg).unwrap();

    let (raw, strategy) = chain.fetch(LISTING_URL).await.unwrap();
    assert_eq!(strategy, "jsonp");
    assert_eq!(raw.name.as_deref(), Some("Canva"));

    let draft = chain.fetch_draft(LISTING_URL).await.unwrap();
    assert_eq!(draft.size, "1 MB");
    assert_eq!(draft.download_url.as_deref(), Some(LISTING_URL));
}

#[tokio::test]
async fn test_chain_reports_every_failure() {
    let base = start_upstream().await;
    let mut cfg = fetch_config(&base);
    cfg.lookup_url = format!("{}/broken", base);
    cfg.strategies = vec!["lookup".into(), "jsonp".into()];
    let chain = FetchChain::from_config(&cfg).unwrap();

    match chain.fetch(LISTING_URL).await.unwrap_err() {
        TransportError::Exhausted(failures) => {
            let names: Vec<&str> = failures.iter().map(|(n, _)| n.as_str()).collect();
            assert_eq!(names, vec!["lookup", "jsonp"]);
        }
        other => panic!("expected exhausted, got {}", other),
    }
}

fn assistant_config(url: String) -> AssistantConfig {
    AssistantConfig {
        provider: "deepseek".into(),
        api_url: url,
        timeout_secs: 5,
        max_retries: 0,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_deepseek_returns_completion() {
    let base = start_upstream().await;
    let model = DeepSeekModel::with_key(&assistant_config(format!("{}/chat", base)), "k").unwrap();
    let context = ConversationContext::snapshot(vec![], chrono::Local::now());

    let reply = model.send("merhaba", &context).await.unwrap();
    assert_eq!(reply, "Merhaba!");
    assert!(model.is_available());
}

#[tokio::test]
async fn test_deepseek_rejected_key_marks_unavailable() {
    let base = start_upstream().await;
    let model =
        DeepSeekModel::with_key(&assistant_config(format!("{}/chat-denied", base)), "bad").unwrap();
    let context = ConversationContext::snapshot(vec![], chrono::Local::now());

    assert!(model.send("merhaba", &context).await.is_err());
    assert!(!model.is_available());
    assert!(model.send("merhaba", &context).await.is_err());
}
