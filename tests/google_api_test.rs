//! Integration tests for the language and pub/sub HTTP clients.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use post_analyzer::config::Config;
use post_analyzer::language::{LanguageClient, LanguageError};
use post_analyzer::models::PubSubEvent;
use post_analyzer::pubsub::{PubSubError, Publisher};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> Config {
    Config {
        language_api_url: server.uri(),
        pubsub_api_url: server.uri(),
        gcp_project_id: "proj".to_string(),
        pubsub_topic: "rube_goldberg".to_string(),
        ..Config::for_testing()
    }
}

#[tokio::test]
async fn test_entity_request_shape_and_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/documents:analyzeEntitySentiment"))
        .and(query_param("key", "secret"))
        .and(body_json(json!({
            "document": { "type": "PLAIN_TEXT", "content": "Ferris loves Rust" },
            "encodingType": "UTF8"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entities": [
                { "name": "Ferris", "type": "PERSON", "salience": 0.6 },
                { "name": "Rust", "type": "OTHER", "salience": 0.4,
                  "sentiment": { "score": 0.8, "magnitude": 0.8 } }
            ],
            "language": "en"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        language_api_key: Some("secret".to_string()),
        ..config_for(&server)
    };
    let client = LanguageClient::new(&config).unwrap();

    let response = client
        .analyze_entity_sentiment("Ferris loves Rust")
        .await
        .unwrap();
    let names: Vec<_> = response.entity_names().collect();
    assert_eq!(names, ["Ferris", "Rust"]);
    assert_eq!(response.language, "en");
}

#[tokio::test]
async fn test_sentiment_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/documents:analyzeSentiment"))
        .and(header("authorization", "Bearer token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documentSentiment": { "score": -0.4, "magnitude": 1.2 },
            "language": "en"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config {
        google_access_token: Some("token-123".to_string()),
        ..config_for(&server)
    };
    let client = LanguageClient::new(&config).unwrap();

    let response = client.analyze_sentiment("this is bad").await.unwrap();
    assert!((response.document_sentiment.score + 0.4).abs() < f32::EPSILON);
}

#[tokio::test]
async fn test_language_api_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("INVALID_ARGUMENT"))
        .mount(&server)
        .await;

    let client = LanguageClient::new(&config_for(&server)).unwrap();
    let err = client.analyze_sentiment("").await.unwrap_err();
    match err {
        LanguageError::Api { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body, "INVALID_ARGUMENT");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_language_undecodable_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = LanguageClient::new(&config_for(&server)).unwrap();
    let err = client.analyze_entity_sentiment("text").await.unwrap_err();
    assert!(matches!(err, LanguageError::Decode(_)));
}

#[tokio::test]
async fn test_topic_exists() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/proj/topics/rube_goldberg"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "name": "projects/proj/topics/rube_goldberg" })),
        )
        .mount(&server)
        .await;

    let publisher = Publisher::new(&config_for(&server)).unwrap();
    assert!(publisher.topic_exists().await.unwrap());
}

#[tokio::test]
async fn test_topic_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/proj/topics/rube_goldberg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let publisher = Publisher::new(&config_for(&server)).unwrap();
    assert!(!publisher.topic_exists().await.unwrap());
}

#[tokio::test]
async fn test_topic_check_permission_denied() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
        .mount(&server)
        .await;

    let publisher = Publisher::new(&config_for(&server)).unwrap();
    let err = publisher.topic_exists().await.unwrap_err();
    assert!(matches!(err, PubSubError::Api { status: 403, .. }));
}

#[tokio::test]
async fn test_publish_encodes_event() {
    let server = MockServer::start().await;
    let data = STANDARD.encode(r#"{"eventType":"update-post-sentiment","payload":"hot_analyzed.json"}"#);
    Mock::given(method("POST"))
        .and(path("/v1/projects/proj/topics/rube_goldberg:publish"))
        .and(body_json(json!({ "messages": [ { "data": data } ] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messageIds": ["9001"] })))
        .expect(1)
        .mount(&server)
        .await;

    let publisher = Publisher::new(&config_for(&server)).unwrap();
    let message_id = publisher
        .publish(&PubSubEvent {
            event_type: "update-post-sentiment".to_string(),
            payload: "hot_analyzed.json".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(message_id, "9001");
}
