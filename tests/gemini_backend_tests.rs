use std::sync::Arc;

use palaver::core::controller::ConversationController;
use palaver::inference::{
    BackendError, ChatBackend, ChatSession, GeminiBackend, GenerationConfig, Message, Role,
    is_rate_limit,
};
use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helper Functions
// ============================================================================

/// A minimal successful generateContent response body.
fn reply_body(text: &str) -> serde_json::Value {
    json!({
        "candidates": [
            { "content": { "role": "model", "parts": [ { "text": text } ] } }
        ]
    })
}

fn backend_for(server: &MockServer) -> GeminiBackend {
    GeminiBackend::new(
        Some("test-key".to_string()),
        "test-model".to_string(),
        Some(server.uri()),
    )
}

fn user_msg(text: &str) -> Message {
    Message {
        role: Role::User,
        text: text.to_string(),
    }
}

fn assistant_msg(text: &str) -> Message {
    Message {
        role: Role::Assistant,
        text: text.to_string(),
    }
}

async fn request_bodies(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .expect("request recording enabled")
        .iter()
        .map(|r| serde_json::from_slice(&r.body).expect("JSON body"))
        .collect()
}

// ============================================================================
// Wire Format Tests
// ============================================================================

#[tokio::test]
async fn test_send_returns_candidate_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/test-model:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("Hi there")))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let mut session = tokio_test::assert_ok!(
        backend.open_session(&[], &GenerationConfig::default()).await
    );
    let reply = tokio_test::assert_ok!(session.send("Hello").await);
    assert_eq!(reply, "Hi there");
}

#[tokio::test]
async fn test_request_carries_seed_history_and_generation_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/test-model:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("ok")))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let history = vec![user_msg("Earlier question"), assistant_msg("Earlier answer")];
    let mut session = backend
        .open_session(&history, &GenerationConfig::default())
        .await
        .unwrap();
    session.send("Follow-up").await.unwrap();

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    let contents = bodies[0]["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0]["role"], "user");
    assert_eq!(contents[0]["parts"][0]["text"], "Earlier question");
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[2]["role"], "user");
    assert_eq!(contents[2]["parts"][0]["text"], "Follow-up");

    let generation = &bodies[0]["generationConfig"];
    assert_eq!(generation["temperature"], 0.7);
    assert_eq!(generation["maxOutputTokens"], 1024);
}

#[tokio::test]
async fn test_session_accumulates_turns_across_sends() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/test-model:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("reply")))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let mut session = backend
        .open_session(&[], &GenerationConfig::default())
        .await
        .unwrap();
    session.send("first").await.unwrap();
    session.send("second").await.unwrap();

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    // Second request replays the first exchange before the new turn.
    let contents = bodies[1]["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0]["parts"][0]["text"], "first");
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[1]["parts"][0]["text"], "reply");
    assert_eq!(contents[2]["parts"][0]["text"], "second");
}

// ============================================================================
// Error Mapping Tests
// ============================================================================

#[tokio::test]
async fn test_http_429_maps_to_rate_limit_class_error() {
    let server = MockServer::start().await;
    let quota_body = json!({
        "error": {
            "code": 429,
            "message": "Resource has been exhausted",
            "status": "RESOURCE_EXHAUSTED",
            "details": [ { "retryDelay": "7s" } ]
        }
    });
    Mock::given(method("POST"))
        .and(path("/models/test-model:generateContent"))
        .respond_with(ResponseTemplate::new(429).set_body_json(quota_body))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let mut session = backend
        .open_session(&[], &GenerationConfig::default())
        .await
        .unwrap();
    let err = session.send("hello").await.unwrap_err();

    assert!(matches!(err, BackendError::Api { status: 429, .. }));
    // The raw body survives so the retry layer can read the delay hint.
    assert!(err.to_string().contains("retryDelay"));
    assert!(is_rate_limit(&err));
}

#[tokio::test]
async fn test_http_500_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/test-model:generateContent"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let mut session = backend
        .open_session(&[], &GenerationConfig::default())
        .await
        .unwrap();
    let err = session.send("hello").await.unwrap_err();

    assert!(matches!(err, BackendError::Api { status: 500, .. }));
    assert!(!is_rate_limit(&err));
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let backend = GeminiBackend::new(
        Some("test-key".to_string()),
        "test-model".to_string(),
        Some("http://127.0.0.1:1".to_string()),
    );
    let mut session = backend
        .open_session(&[], &GenerationConfig::default())
        .await
        .unwrap();
    let err = session.send("hello").await.unwrap_err();

    assert!(matches!(err, BackendError::Network(_)));
}

// ============================================================================
// Controller End-to-End Tests
// ============================================================================

#[tokio::test]
async fn test_controller_round_trip_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/test-model:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("Hello from Gemini")))
        .mount(&server)
        .await;

    let backend = Arc::new(backend_for(&server));
    let mut controller = ConversationController::new(backend);
    controller.submit("Hi").await;

    let messages = controller.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].text, "Hello from Gemini");
    assert!(!controller.is_loading());
}

#[tokio::test]
async fn test_controller_surfaces_server_failure_and_recovers_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/test-model:generateContent"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let backend = Arc::new(backend_for(&server));
    let mut controller = ConversationController::new(backend);
    controller.submit("Hi").await;

    let messages = controller.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
    assert!(messages[1].text.contains("error"));
    assert!(controller.error.is_some());
    // The session was invalidated and eagerly rebuilt.
    assert!(controller.has_session());
    assert!(!controller.is_loading());
}
