//! Integration tests for web routes.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use post_analyzer::config::Config;
use post_analyzer::language::LanguageClient;
use post_analyzer::pipeline::Analyzer;
use post_analyzer::storage::MemoryStore;
use post_analyzer::web::{create_app, AppState};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const POSTS: &str = r#"[{"id": "p1", "title": "t", "body": "Rust is fun"}]"#;

fn create_test_app(server: &MockServer, store: &MemoryStore) -> Router {
    let config = Config {
        language_api_url: server.uri(),
        ..Config::for_testing()
    };
    let language = LanguageClient::new(&config).expect("language client");
    let analyzer = Arc::new(Analyzer::new(
        &config,
        Arc::new(store.clone()),
        language,
        None,
    ));

    create_app(AppState {
        config: Arc::new(config),
        analyzer,
    })
}

async fn mock_language(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/documents:analyzeEntitySentiment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entities": [ { "name": "Rust", "type": "OTHER" } ]
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/documents:analyzeSentiment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documentSentiment": { "score": 0.7, "magnitude": 0.7 }
        })))
        .mount(server)
        .await;
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Wait for a background stage to write `key`.
async fn wait_for_object(store: &MemoryStore, key: &str) -> Option<Vec<u8>> {
    for _ in 0..100 {
        if let Some(bytes) = store.get(key).await {
            return Some(bytes);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    None
}

fn push_request(event: &serde_json::Value) -> Request<Body> {
    let data = STANDARD.encode(serde_json::to_vec(event).unwrap());
    let envelope = json!({
        "message": { "data": data, "messageId": "1" },
        "subscription": "projects/test-project/subscriptions/sentiment"
    });
    Request::builder()
        .method("POST")
        .uri("/api/pubsub/push")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&envelope).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn test_missing_filename_is_rejected() {
    let server = MockServer::start().await;
    let store = MemoryStore::new();

    for uri in [
        "/api/analyze/posts",
        "/api/analyze/entity",
        "/api/analyze/sentiment?filename=",
    ] {
        let app = create_test_app(&server, &store);
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body_string(response).await, "missing required input filename");
    }
}

#[tokio::test]
async fn test_non_get_is_rejected() {
    let server = MockServer::start().await;
    let store = MemoryStore::new();
    let app = create_test_app(&server, &store);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/analyze/entity?filename=posts.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "must be GET request");
    assert!(store.keys().await.is_empty());
}

#[tokio::test]
async fn test_analyze_posts_acknowledges_and_runs_in_background() {
    let server = MockServer::start().await;
    mock_language(&server).await;
    let store = MemoryStore::new();
    store
        .insert("reddit_data/posts.json", POSTS.as_bytes().to_vec())
        .await;
    let app = create_test_app(&server, &store);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/analyze/posts?filename=posts.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "analyzing \"posts.json\"");

    let output = wait_for_object(&store, "reddit_data/posts_analyzed.json")
        .await
        .expect("stage should write output");
    let records: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(records[0]["id"], "p1");
    assert_eq!(records[0]["entity"][0]["name"], "Rust");
    assert_eq!(records[0]["sentiment"]["parsedSentiment"], "positive");
}

#[tokio::test]
async fn test_push_triggers_sentiment_stage() {
    let server = MockServer::start().await;
    mock_language(&server).await;
    let store = MemoryStore::new();
    store
        .insert("reddit_data/posts.json", POSTS.as_bytes().to_vec())
        .await;
    store
        .insert(
            "reddit_data/posts_analyzed.json",
            br#"[{"id": "p1", "entity": [{"name": "Rust", "count": 1}]}]"#.to_vec(),
        )
        .await;
    let app = create_test_app(&server, &store);

    let response = app
        .oneshot(push_request(&json!({
            "eventType": "update-post-sentiment",
            "payload": "posts_analyzed.json"
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let mut updated = None;
    for _ in 0..100 {
        let bytes = store.get("reddit_data/posts_analyzed.json").await.unwrap();
        let records: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        if records[0]["sentiment"]["parsedSentiment"] == "positive" {
            updated = Some(records);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let records = updated.expect("sentiment stage should update the record");
    assert_eq!(records[0]["entity"][0]["name"], "Rust");
}

#[tokio::test]
async fn test_push_unknown_event_is_acknowledged() {
    let server = MockServer::start().await;
    let store = MemoryStore::new();
    let app = create_test_app(&server, &store);

    let response = app
        .oneshot(push_request(&json!({
            "eventType": "something-else",
            "payload": "posts.json"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_push_malformed_envelope_is_acknowledged() {
    let server = MockServer::start().await;
    let store = MemoryStore::new();

    let bad_data = json!({
        "message": { "data": "%%% not base64", "messageId": "2" },
        "subscription": "projects/test-project/subscriptions/sentiment"
    });
    let requests = [
        Body::from("not json"),
        Body::from(serde_json::to_vec(&bad_data).unwrap()),
    ];
    for body in requests {
        let app = create_test_app(&server, &store);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/pubsub/push")
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap();

        // Acknowledged so Pub/Sub stops redelivering it
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let response = create_test_app(&server, &store)
        .oneshot(push_request(&json!({
            "eventType": "update-post-sentiment",
            "payload": ""
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(store.keys().await.is_empty());
}

#[tokio::test]
async fn test_method_is_checked_before_query() {
    let server = MockServer::start().await;
    let store = MemoryStore::new();

    for uri in [
        "/api/analyze/entity?filename=a.json&filename=b.json",
        "/api/analyze/posts?filename=x&filename=y",
    ] {
        let app = create_test_app(&server, &store);
        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body_string(response).await, "must be GET request");
    }

    let app = create_test_app(&server, &store);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/analyze/entity?filename=a.json&filename=b.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "missing required input filename");
}

#[tokio::test]
async fn test_health() {
    let server = MockServer::start().await;
    let store = MemoryStore::new();
    let app = create_test_app(&server, &store);

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.starts_with("ok"));
}
