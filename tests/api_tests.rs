//! HTTP control surface tests
//!
//! Requests go through the complete router with `tower::ServiceExt::oneshot`;
//! the bot orchestrator is a wiremock server.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::util::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use voicebridge_gateway::{ServerConfig, routes, state::AppState};

fn config_with_backend() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.realtime_url = Some("wss://rt.example.com/openai/realtime".to_string());
    config.realtime_deployment = Some("gpt-rt".to_string());
    config.realtime_api_key = Some("server-key".to_string());
    config
}

async fn send(config: ServerConfig, request: Request<Body>) -> (StatusCode, Value) {
    let app = routes::create_app(AppState::new(config));
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn start_bot_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/start-bot")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn join() -> Value {
    json!({"meeting": {"MeetingId": "m-1"}, "attendee": {"AttendeeId": "a-1"}})
}

#[tokio::test]
async fn test_health_check() {
    let app = routes::create_app(AppState::new(ServerConfig::default()));
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, json!({"ok": true, "sessions": 0}));
}

#[tokio::test]
async fn test_start_bot_missing_join() {
    let (status, body) = send(
        config_with_backend(),
        start_bot_request(json!({"join": {"meeting": {"MeetingId": "m-1"}}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "join.attendee is required");
}

#[tokio::test]
async fn test_start_bot_malformed_body() {
    let request = Request::builder()
        .method("POST")
        .uri("/start-bot")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(config_with_backend(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn test_start_bot_missing_credentials() {
    let (status, body) = send(
        ServerConfig::default(),
        start_bot_request(json!({"join": join()})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn test_start_bot_without_orchestrator() {
    let (status, body) = send(
        config_with_backend(),
        start_bot_request(json!({"join": join()})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn test_start_bot_launches_through_orchestrator() {
    let orchestrator = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/launch"))
        .and(body_partial_json(json!({
            "join": {"meeting": {"MeetingId": "m-1"}},
            "azure": {"deployment": "override", "apiKey": "server-key", "voice": "alloy"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"botId": "bot-1"})))
        .expect(1)
        .mount(&orchestrator)
        .await;

    let mut config = config_with_backend();
    config.bot_orchestrator_url = Some(format!("{}/launch", orchestrator.uri()));

    let (status, body) = send(
        config,
        start_bot_request(json!({"join": join(), "azure": {"deployment": "override"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true, "botId": "bot-1"}));
}

#[tokio::test]
async fn test_start_bot_orchestrator_failure() {
    let orchestrator = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&orchestrator)
        .await;

    let mut config = config_with_backend();
    config.bot_orchestrator_url = Some(orchestrator.uri());

    let (status, body) = send(config, start_bot_request(json!({"join": join()}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn test_start_bot_keeps_orchestrator_ok_flag() {
    let orchestrator = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": false, "reason": "meeting ended"})),
        )
        .mount(&orchestrator)
        .await;

    let mut config = config_with_backend();
    config.bot_orchestrator_url = Some(orchestrator.uri());

    let (status, body) = send(config, start_bot_request(json!({"join": join()}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": false, "reason": "meeting ended"}));
}
